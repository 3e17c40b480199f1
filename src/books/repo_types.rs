use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::db::fits_money_column;

/// Catalog entry.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: i64,
    pub name: String,
    pub author: String,
    pub price: Decimal,
    pub discount_price: Option<Decimal>,
    pub quantity_in_stock: i32,
    pub cover_image: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Admin payload for creating or replacing a book.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookInput {
    pub name: String,
    pub author: String,
    pub price: Decimal,
    pub discount_price: Option<Decimal>,
    pub quantity_in_stock: i32,
    pub cover_image: Option<String>,
}

impl BookInput {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".into());
        }
        if self.author.trim().is_empty() {
            return Err("author is required".into());
        }
        if self.price.is_sign_negative() {
            return Err("price must not be negative".into());
        }
        if self.discount_price.is_some_and(|d| d.is_sign_negative()) {
            return Err("discountPrice must not be negative".into());
        }
        if !fits_money_column(self.price)
            || self.discount_price.is_some_and(|d| !fits_money_column(d))
        {
            return Err("prices need at most two decimals and must be below 10000000000".into());
        }
        if self.quantity_in_stock < 0 {
            return Err("quantityInStock must not be negative".into());
        }
        Ok(())
    }
}
