use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::repo_types::{ExpenseItem, NewExpense};
use super::services::parse_datespent;
use crate::error::AppError;
use crate::validation::{error, missing, FieldOrder, MISSING_FIELDS};

const INVALID_TOTAL: &str = "Invalid total amount";
const INVALID_DATE: &str = "Invalid date format";
const INVALID_ITEMS: &str = "Items must be an array and must not be empty";
const INVALID_DETAILS: &str = "Additional details must be written in text";
const INCOMPLETE_ITEM: &str = "All items must have a name and an amount";
const INVALID_ITEM: &str = "Items must have a valid name and amount";

/// Body of `POST /expense/add-expense`. Fields stay loosely typed so a value
/// of the wrong JSON type is reported by the rule that owns it. Rules run in
/// field order and stop at the first violation.
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_add_expense"))]
pub struct AddExpenseRequest {
    pub total: Option<Value>,
    pub datespent: Option<Value>,
    pub items: Option<Value>,
    pub additionaldetails: Option<Value>,
}

impl FieldOrder for AddExpenseRequest {
    const FIELDS: &'static [&'static str] = &[];
}

struct CheckedExpense {
    total: f64,
    datespent: OffsetDateTime,
    items: Vec<ExpenseItem>,
    additionaldetails: String,
}

fn valid_amount(value: &Value) -> Option<f64> {
    value.as_f64().filter(|a| a.is_finite() && *a >= 0.0)
}

fn check_item(item: &Value) -> Result<ExpenseItem, ValidationError> {
    let (Some(name), Some(amount)) = (
        item.get("itemName").filter(|v| !v.is_null()),
        item.get("amount").filter(|v| !v.is_null()),
    ) else {
        return Err(error("items", INCOMPLETE_ITEM));
    };
    match (name.as_str().map(str::trim), valid_amount(amount)) {
        (Some(name), Some(amount)) if !name.is_empty() => Ok(ExpenseItem {
            item_name: name.to_string(),
            amount,
        }),
        _ => Err(error("items", INVALID_ITEM)),
    }
}

fn check(req: &AddExpenseRequest) -> Result<CheckedExpense, ValidationError> {
    let (Some(total), Some(datespent), Some(items)) = (&req.total, &req.datespent, &req.items)
    else {
        return Err(missing());
    };

    let total = valid_amount(total).ok_or_else(|| error("total", INVALID_TOTAL))?;
    let datespent = datespent
        .as_str()
        .and_then(parse_datespent)
        .ok_or_else(|| error("datespent", INVALID_DATE))?;
    let items = match items.as_array() {
        Some(items) if !items.is_empty() => items,
        _ => return Err(error("items", INVALID_ITEMS)),
    };
    let additionaldetails = match &req.additionaldetails {
        None => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(_) => return Err(error("additionaldetails", INVALID_DETAILS)),
    };
    let items = items.iter().map(check_item).collect::<Result<Vec<_>, _>>()?;

    Ok(CheckedExpense {
        total,
        datespent,
        items,
        additionaldetails,
    })
}

fn validate_add_expense(req: &AddExpenseRequest) -> Result<(), ValidationError> {
    check(req).map(|_| ())
}

impl AddExpenseRequest {
    /// Builds the record to persist, re-running the same rules as `validate`.
    pub fn into_new_expense(self, user_id: Uuid) -> Result<NewExpense, AppError> {
        let checked = check(&self).map_err(|e| {
            AppError::Validation(
                e.message
                    .map(|m| m.into_owned())
                    .unwrap_or_else(|| MISSING_FIELDS.into()),
            )
        })?;
        Ok(NewExpense {
            user_id,
            total: checked.total,
            datespent: checked.datespent,
            items: checked.items,
            additionaldetails: checked.additionaldetails,
        })
    }
}

/// Query of `GET /expense/get-expenses`. Kept as text so a bad value gets
/// the JSON error body instead of axum's plain-text rejection.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub month: Option<String>,
    pub year: Option<String>,
}
