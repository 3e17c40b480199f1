use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};

use crate::error::RepoError;
use crate::orders::repo_types::{NewOrder, Order, OrderItem, OrderRow};

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Newest first, each order with its items.
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Order>, RepoError>;
    async fn find_for_user(&self, user_id: i64, order_id: i64)
        -> Result<Option<Order>, RepoError>;
}

#[derive(Clone)]
pub struct PgOrderRepository {
    db: PgPool,
}

impl PgOrderRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn attach_items(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepoError> {
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, book_id, quantity, unit_price
              FROM order_items
             WHERE order_id = ANY($1)
             ORDER BY id ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let mut by_order: HashMap<i64, Vec<OrderItem>> = HashMap::new();
        for item in items {
            by_order.entry(item.order_id).or_default().push(item);
        }

        rows.into_iter()
            .map(|r| {
                let items = by_order.remove(&r.id).unwrap_or_default();
                r.into_order(items)
            })
            .collect()
    }
}

/// Inserts the order and its items on the given connection, normally a
/// transaction opened by the caller. Returns the order and the row count.
pub async fn insert_order_on(
    conn: &mut PgConnection,
    order: NewOrder,
) -> Result<(Order, u64), RepoError> {
    let row = sqlx::query_as::<_, OrderRow>(
        r#"
        INSERT INTO orders (user_id, status, total_amount, shipping_address)
        VALUES ($1, $2, $3, $4)
        RETURNING id, user_id, status, total_amount, shipping_address, created_at
        "#,
    )
    .bind(order.user_id)
    .bind(order.status.as_str())
    .bind(order.total_amount)
    .bind(&order.shipping_address)
    .fetch_one(&mut *conn)
    .await?;

    let mut items = Vec::with_capacity(order.items.len());
    for item in &order.items {
        let inserted = sqlx::query_as::<_, OrderItem>(
            r#"
            INSERT INTO order_items (order_id, book_id, quantity, unit_price)
            VALUES ($1, $2, $3, $4)
            RETURNING id, order_id, book_id, quantity, unit_price
            "#,
        )
        .bind(row.id)
        .bind(item.book_id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .fetch_one(&mut *conn)
        .await?;
        items.push(inserted);
    }

    let written = 1 + items.len() as u64;
    Ok((row.into_order(items)?, written))
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Order>, RepoError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, user_id, status, total_amount, shipping_address, created_at
              FROM orders
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        self.attach_items(rows).await
    }

    async fn find_for_user(
        &self,
        user_id: i64,
        order_id: i64,
    ) -> Result<Option<Order>, RepoError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, user_id, status, total_amount, shipping_address, created_at
              FROM orders
             WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(r) => Ok(self.attach_items(vec![r]).await?.pop()),
            None => Ok(None),
        }
    }
}
