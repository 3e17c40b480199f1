use std::sync::Arc;

use sqlx::PgPool;
use tracing::{info, warn};

use crate::auth::repo::{PgUserRepository, UserRepository};
use crate::books::repo::{BookRepository, PgBookRepository};
use crate::cart::repo::{CartRepository, PgCartRepository};
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::db::{PgTransactionFactory, TransactionFactory};
use crate::mailer::{LogMailer, Mailer, SmtpMailer};
use crate::orders::repo::{OrderRepository, PgOrderRepository};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepository>,
    pub books: Arc<dyn BookRepository>,
    pub carts: Arc<dyn CartRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub transactions: Arc<dyn TransactionFactory>,
    pub mailer: Arc<dyn Mailer>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Postgres-backed state. SMTP is used when configured, otherwise mail
    /// only goes to the log.
    pub fn from_pool(config: Arc<AppConfig>, db: PgPool) -> anyhow::Result<Self> {
        let mailer: Arc<dyn Mailer> = match &config.smtp {
            Some(smtp) => {
                info!(host = %smtp.host, port = smtp.port, "smtp mailer enabled");
                Arc::new(SmtpMailer::new(smtp)?)
            }
            None => {
                warn!("SMTP_HOST not set; emails will only be logged");
                Arc::new(LogMailer)
            }
        };

        Ok(Self {
            users: Arc::new(PgUserRepository::new(db.clone())),
            books: Arc::new(PgBookRepository::new(db.clone())),
            carts: Arc::new(PgCartRepository::new(db.clone())),
            orders: Arc::new(PgOrderRepository::new(db.clone())),
            transactions: Arc::new(PgTransactionFactory::new(db)),
            mailer,
            clock: Arc::new(SystemClock),
            config,
        })
    }
}
