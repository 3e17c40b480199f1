//! Pool setup and the unit of work used for multi-statement writes.

use anyhow::Context;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};
use tracing::debug;

use crate::cart::repo::clear_cart_on;
use crate::config::AppConfig;
use crate::error::RepoError;
use crate::orders::repo::insert_order_on;
use crate::orders::repo_types::{NewOrder, Order};

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("connect to database")
}

/// Digits after the point in every money column (`NUMERIC(12,2)`).
pub const MONEY_SCALE: u32 = 2;

/// Whether `amount` is stored by a `NUMERIC(12,2)` column exactly: Postgres
/// rounds extra decimals and rejects magnitudes of 10^10 or more.
pub fn fits_money_column(amount: Decimal) -> bool {
    amount.normalize().scale() <= MONEY_SCALE && amount.abs() < Decimal::from(10_000_000_000_i64)
}

/// Writes staged in one atomic scope.
///
/// Nothing is visible to other readers before [`UnitOfWork::commit`]. A unit
/// of work dropped without commit (for instance because the request future
/// was cancelled) is rolled back.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn add_order(&mut self, order: NewOrder) -> Result<Order, RepoError>;
    async fn clear_cart(&mut self, user_id: i64) -> Result<u64, RepoError>;
    /// Returns the number of rows written in this unit.
    async fn commit(self: Box<Self>) -> Result<u64, RepoError>;
    async fn rollback(self: Box<Self>) -> Result<(), RepoError>;
}

#[async_trait]
pub trait TransactionFactory: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepoError>;
}

#[derive(Clone)]
pub struct PgTransactionFactory {
    db: PgPool,
}

impl PgTransactionFactory {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TransactionFactory for PgTransactionFactory {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepoError> {
        let tx = self.db.begin().await?;
        debug!("transaction started");
        Ok(Box::new(PgUnitOfWork { tx, written: 0 }))
    }
}

pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
    written: u64,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn add_order(&mut self, order: NewOrder) -> Result<Order, RepoError> {
        let (order, rows) = insert_order_on(&mut *self.tx, order).await?;
        self.written += rows;
        Ok(order)
    }

    async fn clear_cart(&mut self, user_id: i64) -> Result<u64, RepoError> {
        let rows = clear_cart_on(&mut *self.tx, user_id).await?;
        self.written += rows;
        Ok(rows)
    }

    async fn commit(self: Box<Self>) -> Result<u64, RepoError> {
        let written = self.written;
        self.tx.commit().await?;
        debug!(rows = written, "transaction committed");
        Ok(written)
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepoError> {
        self.tx.rollback().await?;
        debug!("transaction rolled back");
        Ok(())
    }
}
