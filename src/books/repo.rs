use async_trait::async_trait;
use sqlx::PgPool;

use crate::books::repo_types::{Book, BookInput};
use crate::error::RepoError;

#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Book>, RepoError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Book>, RepoError>;
    async fn create(&self, input: &BookInput) -> Result<Book, RepoError>;
    async fn update(&self, id: i64, input: &BookInput) -> Result<Option<Book>, RepoError>;
    /// Returns false when no book had that id.
    async fn delete(&self, id: i64) -> Result<bool, RepoError>;
}

#[derive(Clone)]
pub struct PgBookRepository {
    db: PgPool,
}

impl PgBookRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BookRepository for PgBookRepository {
    async fn list(&self) -> Result<Vec<Book>, RepoError> {
        let rows = sqlx::query_as::<_, Book>(
            r#"
            SELECT id, name, author, price, discount_price, quantity_in_stock, cover_image, created_at
              FROM books
             ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Book>, RepoError> {
        let row = sqlx::query_as::<_, Book>(
            r#"
            SELECT id, name, author, price, discount_price, quantity_in_stock, cover_image, created_at
              FROM books
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn create(&self, input: &BookInput) -> Result<Book, RepoError> {
        let row = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (name, author, price, discount_price, quantity_in_stock, cover_image)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, author, price, discount_price, quantity_in_stock, cover_image, created_at
            "#,
        )
        .bind(&input.name)
        .bind(&input.author)
        .bind(input.price)
        .bind(input.discount_price)
        .bind(input.quantity_in_stock)
        .bind(&input.cover_image)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn update(&self, id: i64, input: &BookInput) -> Result<Option<Book>, RepoError> {
        let row = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
               SET name = $2, author = $3, price = $4, discount_price = $5,
                   quantity_in_stock = $6, cover_image = $7
             WHERE id = $1
            RETURNING id, name, author, price, discount_price, quantity_in_stock, cover_image, created_at
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.author)
        .bind(input.price)
        .bind(input.discount_price)
        .bind(input.quantity_in_stock)
        .bind(&input.cover_image)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn delete(&self, id: i64) -> Result<bool, RepoError> {
        let done = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(done.rows_affected() > 0)
    }
}
