use rust_decimal::Decimal;
use serde::Deserialize;

use super::services::OrderLine;

/// One entry of the `POST /orders` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderItem {
    pub book_id: i64,
    pub quantity: i32,
    pub price: Decimal,
}

impl From<PlaceOrderItem> for OrderLine {
    fn from(i: PlaceOrderItem) -> Self {
        Self {
            book_id: i.book_id,
            quantity: i.quantity,
            unit_price: i.price,
        }
    }
}
