use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

/// One line of an expense. Serialized with the `itemName` key clients send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseItem {
    #[serde(rename = "itemName")]
    pub item_name: String,
    pub amount: f64,
}

#[derive(Debug, FromRow)]
pub struct ExpenseRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total: f64,
    pub datespent: OffsetDateTime,
    pub items: Json<Vec<ExpenseItem>>,
    pub additionaldetails: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct Expense {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub datespent: OffsetDateTime,
    pub items: Vec<ExpenseItem>,
    pub additionaldetails: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<ExpenseRow> for Expense {
    fn from(r: ExpenseRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            total: r.total,
            datespent: r.datespent,
            items: r.items.0,
            additionaldetails: r.additionaldetails,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewExpense {
    pub user_id: Uuid,
    pub total: f64,
    pub datespent: OffsetDateTime,
    pub items: Vec<ExpenseItem>,
    pub additionaldetails: String,
}

/// Half-open `[start, end)` interval on `datespent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl DateRange {
    pub fn contains(&self, at: OffsetDateTime) -> bool {
        at >= self.start && at < self.end
    }
}
