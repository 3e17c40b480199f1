use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};

use crate::cart::repo_types::CartItem;
use crate::error::RepoError;

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn items_for_user(&self, user_id: i64, wishlist: bool)
        -> Result<Vec<CartItem>, RepoError>;

    /// Inserts the (user, book, wishlist) row or, when it already exists,
    /// adds `quantity` to a cart row and leaves a wishlist row untouched.
    async fn add_or_accumulate(
        &self,
        user_id: i64,
        book_id: i64,
        quantity: i32,
        wishlist: bool,
    ) -> Result<CartItem, RepoError>;

    /// Only cart rows have a quantity to change.
    async fn set_quantity(
        &self,
        user_id: i64,
        item_id: i64,
        quantity: i32,
    ) -> Result<Option<CartItem>, RepoError>;

    /// Deletes the row only when it belongs to the user and sits on the
    /// given list.
    async fn delete_item(&self, user_id: i64, item_id: i64, wishlist: bool)
        -> Result<bool, RepoError>;

    /// Removes the wishlist row and adds its book to the cart (quantity 1,
    /// accumulated) in a single statement. `None` when the user has no such
    /// wishlist row.
    async fn move_to_cart(&self, user_id: i64, item_id: i64)
        -> Result<Option<CartItem>, RepoError>;
}

#[derive(Clone)]
pub struct PgCartRepository {
    db: PgPool,
}

impl PgCartRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Cart clear usable inside a caller's transaction.
pub async fn clear_cart_on(conn: &mut PgConnection, user_id: i64) -> Result<u64, RepoError> {
    let done = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND is_wishlist = FALSE")
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(done.rows_affected())
}

#[async_trait]
impl CartRepository for PgCartRepository {
    async fn items_for_user(
        &self,
        user_id: i64,
        wishlist: bool,
    ) -> Result<Vec<CartItem>, RepoError> {
        let rows = sqlx::query_as::<_, CartItem>(
            r#"
            SELECT id, user_id, book_id, quantity, is_wishlist, created_at
              FROM cart_items
             WHERE user_id = $1 AND is_wishlist = $2
             ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(user_id)
        .bind(wishlist)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn add_or_accumulate(
        &self,
        user_id: i64,
        book_id: i64,
        quantity: i32,
        wishlist: bool,
    ) -> Result<CartItem, RepoError> {
        let row = sqlx::query_as::<_, CartItem>(
            r#"
            INSERT INTO cart_items (user_id, book_id, quantity, is_wishlist)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, book_id, is_wishlist) DO UPDATE
               SET quantity = CASE
                       WHEN cart_items.is_wishlist THEN cart_items.quantity
                       ELSE cart_items.quantity + EXCLUDED.quantity
                   END
            RETURNING id, user_id, book_id, quantity, is_wishlist, created_at
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(quantity)
        .bind(wishlist)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn set_quantity(
        &self,
        user_id: i64,
        item_id: i64,
        quantity: i32,
    ) -> Result<Option<CartItem>, RepoError> {
        let row = sqlx::query_as::<_, CartItem>(
            r#"
            UPDATE cart_items
               SET quantity = $3
             WHERE id = $1 AND user_id = $2 AND is_wishlist = FALSE
            RETURNING id, user_id, book_id, quantity, is_wishlist, created_at
            "#,
        )
        .bind(item_id)
        .bind(user_id)
        .bind(quantity)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn delete_item(
        &self,
        user_id: i64,
        item_id: i64,
        wishlist: bool,
    ) -> Result<bool, RepoError> {
        let done = sqlx::query(
            "DELETE FROM cart_items WHERE id = $1 AND user_id = $2 AND is_wishlist = $3",
        )
        .bind(item_id)
        .bind(user_id)
        .bind(wishlist)
        .execute(&self.db)
        .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn move_to_cart(
        &self,
        user_id: i64,
        item_id: i64,
    ) -> Result<Option<CartItem>, RepoError> {
        // Delete and upsert touch rows with different `is_wishlist` values.
        let row = sqlx::query_as::<_, CartItem>(
            r#"
            WITH moved AS (
                DELETE FROM cart_items
                 WHERE id = $1 AND user_id = $2 AND is_wishlist = TRUE
                RETURNING user_id, book_id
            )
            INSERT INTO cart_items (user_id, book_id, quantity, is_wishlist)
            SELECT user_id, book_id, 1, FALSE FROM moved
            ON CONFLICT (user_id, book_id, is_wishlist) DO UPDATE
               SET quantity = cart_items.quantity + EXCLUDED.quantity
            RETURNING id, user_id, book_id, quantity, is_wishlist, created_at
            "#,
        )
        .bind(item_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }
}
