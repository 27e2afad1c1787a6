use anyhow::Context;
use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::repo_types::{DateRange, Expense, ExpenseRow, NewExpense};

#[async_trait]
pub trait ExpenseRepo: Send + Sync {
    async fn insert(&self, new: NewExpense) -> anyhow::Result<Expense>;
    /// Newest `datespent` first.
    async fn list_by_user(
        &self,
        user_id: Uuid,
        range: Option<DateRange>,
    ) -> anyhow::Result<Vec<Expense>>;
    async fn find_by_id(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Expense>>;
}

#[derive(Clone)]
pub struct PgExpenseRepo {
    db: PgPool,
}

impl PgExpenseRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ExpenseRepo for PgExpenseRepo {
    async fn insert(&self, new: NewExpense) -> anyhow::Result<Expense> {
        let row = sqlx::query_as::<_, ExpenseRow>(
            r#"
            INSERT INTO expenses (id, user_id, total, datespent, items, additionaldetails)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, total, datespent, items, additionaldetails, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(new.total)
        .bind(new.datespent)
        .bind(Json(new.items))
        .bind(new.additionaldetails)
        .fetch_one(&self.db)
        .await
        .context("insert expense")?;
        Ok(row.into())
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        range: Option<DateRange>,
    ) -> anyhow::Result<Vec<Expense>> {
        let rows = sqlx::query_as::<_, ExpenseRow>(
            r#"
            SELECT id, user_id, total, datespent, items, additionaldetails, created_at
              FROM expenses
             WHERE user_id = $1
               AND ($2::timestamptz IS NULL OR datespent >= $2)
               AND ($3::timestamptz IS NULL OR datespent < $3)
             ORDER BY datespent DESC, created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(range.map(|r| r.start))
        .bind(range.map(|r| r.end))
        .fetch_all(&self.db)
        .await
        .context("list expenses by user")?;
        Ok(rows.into_iter().map(Expense::from).collect())
    }

    async fn find_by_id(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Expense>> {
        let row = sqlx::query_as::<_, ExpenseRow>(
            r#"
            SELECT id, user_id, total, datespent, items, additionaldetails, created_at
              FROM expenses
             WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .context("get expense")?;
        Ok(row.map(Expense::from))
    }
}
