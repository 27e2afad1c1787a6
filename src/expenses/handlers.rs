use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{AddExpenseRequest, ListQuery};
use super::repo_types::{DateRange, Expense};
use super::services::month_range;
use crate::{
    auth::middleware::AuthUser,
    error::{AppError, AppResult},
    state::AppState,
    validation::ValidatedJson,
};

pub fn write_routes() -> Router<AppState> {
    Router::new().route("/add-expense", post(add_expense))
}

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/get-expenses", get(list_expenses))
        .route("/get-expense/:id", get(get_expense))
}

#[instrument(skip(state, payload), fields(user_id = %user.id))]
pub async fn add_expense(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(payload): ValidatedJson<AddExpenseRequest>,
) -> AppResult<(StatusCode, Json<Expense>)> {
    let new = payload.into_new_expense(user.id)?;
    let expense = state.expenses.insert(new).await?;
    info!(expense_id = %expense.id, username = %user.username, total = expense.total, "expense added");
    Ok((StatusCode::CREATED, Json(expense)))
}

#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn list_expenses(
    State(state): State<AppState>,
    user: AuthUser,
    Query(q): Query<ListQuery>,
) -> AppResult<Json<Vec<Expense>>> {
    let range = month_filter(q.month.as_deref(), q.year.as_deref())?;
    let expenses = state.expenses.list_by_user(user.id, range).await?;
    Ok(Json(expenses))
}

#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn get_expense(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Expense>> {
    let id = Uuid::parse_str(&id).map_err(|_| {
        warn!(%id, "malformed expense id");
        AppError::Validation("Invalid expense ID".into())
    })?;
    match state.expenses.find_by_id(user.id, id).await? {
        Some(expense) => Ok(Json(expense)),
        None => Err(AppError::NotFound("Expense not found".into())),
    }
}

/// Filters only when both month and year are given and non-empty.
fn month_filter(month: Option<&str>, year: Option<&str>) -> AppResult<Option<DateRange>> {
    let (Some(month), Some(year)) = (
        month.filter(|m| !m.is_empty()),
        year.filter(|y| !y.is_empty()),
    ) else {
        return Ok(None);
    };
    let invalid = || AppError::Validation("Invalid month or year".into());
    let month = month.trim().parse::<u8>().map_err(|_| invalid())?;
    let year = year.trim().parse::<i32>().map_err(|_| invalid())?;
    month_range(year, month).map(Some).ok_or_else(invalid)
}
