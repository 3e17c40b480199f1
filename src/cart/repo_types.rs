use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// A cart line, or a wishlist entry when `is_wishlist` is set.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: i64,
    pub user_id: i64,
    pub book_id: i64,
    pub quantity: i32,
    pub is_wishlist: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
