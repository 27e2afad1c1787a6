use crate::auth::jwt::JwtKeys;
use crate::auth::repo::{PgUserRepo, UserRepo};
use crate::config::AppConfig;
use crate::expenses::repo::{ExpenseRepo, PgExpenseRepo};
use crate::mail::{HttpMailer, LogMailer, Mailer};
use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything a handler needs, built once at startup and cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
    pub users: Arc<dyn UserRepo>,
    pub expenses: Arc<dyn ExpenseRepo>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;

        let mailer = match &config.mail {
            Some(mail) => {
                info!(api_url = %mail.api_url, "using http mail transport");
                Arc::new(HttpMailer::new(mail)?) as Arc<dyn Mailer>
            }
            None => {
                warn!("MAIL_API_URL not set; reset emails will only be logged");
                Arc::new(LogMailer) as Arc<dyn Mailer>
            }
        };

        Ok(Self::from_parts(
            config.clone(),
            Arc::new(PgUserRepo::new(db.clone())),
            Arc::new(PgExpenseRepo::new(db)),
            mailer,
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepo>,
        expenses: Arc<dyn ExpenseRepo>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            jwt: JwtKeys::from_config(&config.jwt),
            config,
            users,
            expenses,
            mailer,
        }
    }
}
