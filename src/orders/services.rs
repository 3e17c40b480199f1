use std::sync::Arc;

use axum::extract::FromRef;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::auth::repo::UserRepository;
use crate::db::{fits_money_column, TransactionFactory, UnitOfWork, MONEY_SCALE};
use crate::error::{AppError, RepoError};
use crate::orders::repo_types::{NewOrder, NewOrderItem, Order, OrderStatus};
use crate::state::AppState;

/// Shipping address stored when the user has none on file.
pub const NO_ADDRESS_PLACEHOLDER: &str = "No shipping address on file";

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("{0}")]
    Validation(String),

    #[error("user not found")]
    Unauthorized,

    #[error(transparent)]
    Repository(#[from] RepoError),
}

impl From<OrderError> for AppError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::Validation(msg) => AppError::Validation(msg),
            OrderError::Unauthorized => AppError::Unauthorized("User not found".into()),
            OrderError::Repository(e) => AppError::Repository(e),
        }
    }
}

/// One requested line: the price is taken as sent by the client.
#[derive(Debug, Clone)]
pub struct OrderLine {
    pub book_id: i64,
    pub quantity: i32,
    pub unit_price: Decimal,
}

pub fn validate_lines(lines: &[OrderLine]) -> Result<(), OrderError> {
    if lines.is_empty() {
        return Err(OrderError::Validation("Order must contain at least one item".into()));
    }
    for line in lines {
        if line.quantity <= 0 {
            return Err(OrderError::Validation(format!(
                "Quantity for book {} must be a positive integer",
                line.book_id
            )));
        }
        if line.unit_price.is_sign_negative() && !line.unit_price.is_zero() {
            return Err(OrderError::Validation(format!(
                "Price for book {} must not be negative",
                line.book_id
            )));
        }
        if !fits_money_column(line.unit_price) {
            return Err(OrderError::Validation(format!(
                "Price for book {} must be below 10000000000 with at most {} decimal places",
                line.book_id, MONEY_SCALE
            )));
        }
    }
    Ok(())
}

/// Σ(unit price × quantity) in decimal arithmetic. Every line total and the
/// running sum must still fit the order's money column.
pub fn order_total(lines: &[OrderLine]) -> Result<Decimal, OrderError> {
    lines.iter().try_fold(Decimal::ZERO, |acc, line| {
        line.unit_price
            .checked_mul(Decimal::from(line.quantity))
            .filter(|subtotal| fits_money_column(*subtotal))
            .and_then(|subtotal| acc.checked_add(subtotal))
            .filter(|sum| fits_money_column(*sum))
            .ok_or_else(|| OrderError::Validation("Order total is out of range".into()))
    })
}

pub struct OrderService {
    users: Arc<dyn UserRepository>,
    transactions: Arc<dyn TransactionFactory>,
}

impl FromRef<AppState> for OrderService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.users.clone(), state.transactions.clone())
    }
}

impl OrderService {
    pub fn new(users: Arc<dyn UserRepository>, transactions: Arc<dyn TransactionFactory>) -> Self {
        Self {
            users,
            transactions,
        }
    }

    /// Persists a `Pending` order with its items and empties the user's cart
    /// in one transaction. Any failure after `begin` rolls both back.
    ///
    /// Stock is neither checked nor decremented, and no idempotency key is
    /// used: two identical calls create two orders.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn place_order(&self, user_id: i64, lines: Vec<OrderLine>) -> Result<Order, OrderError> {
        validate_lines(&lines)?;

        if self.users.find_by_id(user_id).await?.is_none() {
            warn!(user_id = %user_id, "order for unknown user");
            return Err(OrderError::Unauthorized);
        }

        let total_amount = order_total(&lines)?;
        let shipping_address = self
            .users
            .primary_address(user_id)
            .await?
            .map(|a| a.one_line())
            .unwrap_or_else(|| NO_ADDRESS_PLACEHOLDER.to_string());

        let new_order = NewOrder {
            user_id,
            status: OrderStatus::Pending,
            total_amount,
            shipping_address,
            items: lines
                .into_iter()
                .map(|l| NewOrderItem {
                    book_id: l.book_id,
                    quantity: l.quantity,
                    unit_price: l.unit_price,
                })
                .collect(),
        };

        let mut uow = self.transactions.begin().await?;
        match write_order(uow.as_mut(), new_order, user_id).await {
            Ok((order, cleared)) => {
                uow.commit().await?;
                info!(
                    user_id = %user_id,
                    order_id = %order.id,
                    total = %order.total_amount,
                    cart_rows_cleared = cleared,
                    "order placed"
                );
                Ok(order)
            }
            Err(e) => {
                error!(user_id = %user_id, error = %e, "order transaction failed; rolling back");
                if let Err(rb) = uow.rollback().await {
                    error!(user_id = %user_id, error = %rb, "rollback failed");
                }
                if e.is_foreign_key_violation() {
                    return Err(OrderError::Validation(
                        "Order references a book that does not exist".into(),
                    ));
                }
                Err(e.into())
            }
        }
    }
}

async fn write_order(
    uow: &mut dyn UnitOfWork,
    order: NewOrder,
    user_id: i64,
) -> Result<(Order, u64), RepoError> {
    let order = uow.add_order(order).await?;
    let cleared = uow.clear_cart(user_id).await?;
    Ok((order, cleared))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::NewAddress;
    use crate::cart::repo::CartRepository;
    use crate::orders::repo::OrderRepository;
    use crate::testing::TestContext;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn line(book_id: i64, quantity: i32, price: &str) -> OrderLine {
        OrderLine {
            book_id,
            quantity,
            unit_price: dec(price),
        }
    }

    #[test]
    fn total_is_exact_in_decimal() {
        let lines = vec![line(1, 2, "100.00"), line(2, 1, "99.99")];
        assert_eq!(order_total(&lines).unwrap(), dec("299.99"));

        let cents = vec![line(1, 3, "0.10"), line(2, 7, "0.20")];
        assert_eq!(order_total(&cents).unwrap(), dec("1.70"));
    }

    #[test]
    fn validation_rules() {
        assert!(matches!(validate_lines(&[]), Err(OrderError::Validation(_))));
        assert!(validate_lines(&[line(1, 0, "1.00")]).is_err());
        assert!(validate_lines(&[line(1, -2, "1.00")]).is_err());
        assert!(validate_lines(&[line(1, 1, "-0.01")]).is_err());
        assert!(validate_lines(&[line(1, 1, "0.00")]).is_ok());
        assert!(validate_lines(&[line(1, 1, "12.500")]).is_ok());
        assert!(validate_lines(&[line(1, 3, "0.333")]).is_err());
        assert!(validate_lines(&[line(1, 1, "10000000000")]).is_err());
    }

    #[test]
    fn total_must_fit_the_money_column() {
        assert_eq!(
            order_total(&[line(1, 1, "9999999999.99")]).unwrap(),
            dec("9999999999.99")
        );
        assert!(matches!(
            order_total(&[line(1, 2, "5000000000.00")]),
            Err(OrderError::Validation(_))
        ));
        assert!(matches!(
            order_total(&[line(1, 1, "6000000000.00"), line(2, 1, "4000000000.00")]),
            Err(OrderError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn sub_cent_and_oversized_orders_are_rejected_before_writing() {
        let ctx = TestContext::new();
        let user = ctx.verified_user("reader@test.com", "Passw0rd!").await;

        let err = ctx
            .orders()
            .place_order(user.id, vec![line(1, 3, "0.333")])
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));

        let err = ctx
            .orders()
            .place_order(user.id, vec![line(1, 2, "5000000000.00")])
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));

        assert_eq!(ctx.db.transactions_started(), 0);
        assert!(ctx.db.list_for_user(user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn placing_an_order_empties_the_cart_but_keeps_the_wishlist() {
        let ctx = TestContext::new();
        let user = ctx.verified_user("reader@test.com", "Passw0rd!").await;
        let a = ctx.book("Dune", "19.99").await;
        let b = ctx.book("Emma", "5.00").await;
        ctx.db.add_or_accumulate(user.id, a.id, 2, false).await.unwrap();
        ctx.db.add_or_accumulate(user.id, b.id, 1, false).await.unwrap();
        ctx.db.add_or_accumulate(user.id, b.id, 1, true).await.unwrap();

        let order = ctx
            .orders()
            .place_order(user.id, vec![line(a.id, 2, "19.99"), line(b.id, 1, "5.00")])
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_amount, dec("44.98"));
        assert_eq!(order.items.len(), 2);
        assert!(ctx.db.items_for_user(user.id, false).await.unwrap().is_empty());
        assert_eq!(ctx.db.items_for_user(user.id, true).await.unwrap().len(), 1);
        assert_eq!(ctx.db.list_for_user(user.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn items_keep_the_client_price() {
        let ctx = TestContext::new();
        let user = ctx.verified_user("reader@test.com", "Passw0rd!").await;
        let book = ctx.book("Dune", "19.99").await;

        let order = ctx
            .orders()
            .place_order(user.id, vec![line(book.id, 1, "9.99")])
            .await
            .unwrap();

        assert_eq!(order.items[0].unit_price, dec("9.99"));
        assert_eq!(order.total_amount, dec("9.99"));
    }

    #[tokio::test]
    async fn shipping_address_uses_first_address_or_placeholder() {
        let ctx = TestContext::new();
        let user = ctx.verified_user("reader@test.com", "Passw0rd!").await;

        let first = ctx
            .orders()
            .place_order(user.id, vec![line(1, 1, "1.00")])
            .await
            .unwrap();
        assert_eq!(first.shipping_address, NO_ADDRESS_PLACEHOLDER);

        ctx.users()
            .add_address(
                user.id,
                NewAddress {
                    line1: "1 Main St".into(),
                    city: "Oslo".into(),
                    postal_code: "0150".into(),
                    country: "NO".into(),
                },
            )
            .await
            .unwrap();
        let second = ctx
            .orders()
            .place_order(user.id, vec![line(1, 1, "1.00")])
            .await
            .unwrap();
        assert_eq!(second.shipping_address, "1 Main St, 0150 Oslo, NO");
    }

    #[tokio::test]
    async fn failing_cart_clear_rolls_back_the_order() {
        let ctx = TestContext::new();
        let user = ctx.verified_user("reader@test.com", "Passw0rd!").await;
        let book = ctx.book("Dune", "19.99").await;
        ctx.db.add_or_accumulate(user.id, book.id, 1, false).await.unwrap();
        ctx.db.fail_next_cart_clear();

        let err = ctx
            .orders()
            .place_order(user.id, vec![line(book.id, 1, "19.99")])
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::Repository(_)));
        assert!(ctx.db.list_for_user(user.id).await.unwrap().is_empty());
        assert_eq!(ctx.db.items_for_user(user.id, false).await.unwrap().len(), 1);
        assert_eq!(ctx.db.rollbacks(), 1);
        assert_eq!(ctx.db.commits(), 0);
    }

    #[tokio::test]
    async fn unknown_user_and_empty_orders_write_nothing() {
        let ctx = TestContext::new();

        let err = ctx
            .orders()
            .place_order(999, vec![line(1, 1, "1.00")])
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Unauthorized));

        let user = ctx.verified_user("reader@test.com", "Passw0rd!").await;
        let err = ctx.orders().place_order(user.id, vec![]).await.unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));

        assert_eq!(ctx.db.transactions_started(), 0);
    }

    #[tokio::test]
    async fn identical_requests_create_two_orders() {
        let ctx = TestContext::new();
        let user = ctx.verified_user("reader@test.com", "Passw0rd!").await;
        let lines = vec![line(1, 1, "3.50")];

        ctx.orders().place_order(user.id, lines.clone()).await.unwrap();
        ctx.orders().place_order(user.id, lines).await.unwrap();

        assert_eq!(ctx.db.list_for_user(user.id).await.unwrap().len(), 2);
    }
}
