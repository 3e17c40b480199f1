use axum::{
    extract::{FromRef, Path, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::AuthUser,
    error::AppError,
    orders::{
        dto::PlaceOrderItem,
        repo_types::Order,
        services::{OrderLine, OrderService},
    },
    state::AppState,
};

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders).post(place_order))
        .route("/orders/:id", get(get_order))
}

#[instrument(skip(state, payload))]
pub async fn place_order(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<Vec<PlaceOrderItem>>,
) -> Result<Json<Order>, AppError> {
    let lines: Vec<OrderLine> = payload.into_iter().map(OrderLine::from).collect();
    let order = OrderService::from_ref(&state)
        .place_order(user_id, lines)
        .await?;
    Ok(Json(order))
}

#[instrument(skip(state))]
pub async fn list_orders(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.orders.list_for_user(user_id).await?))
}

#[instrument(skip(state))]
pub async fn get_order(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Order>, AppError> {
    state
        .orders
        .find_for_user(user_id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Order not found".into()))
}
