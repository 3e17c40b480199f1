use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::AuthUser,
    cart::{
        dto::{AddToCartRequest, AddToWishlistRequest, UpdateQuantityRequest},
        repo_types::CartItem,
        services::CartService,
    },
    error::AppError,
    state::AppState,
};

pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(list_cart).post(add_to_cart))
        .route("/cart/:id", put(update_quantity).delete(remove_item))
        .route("/wishlist", get(list_wishlist).post(add_to_wishlist))
        .route("/wishlist/:id", delete(remove_from_wishlist))
        .route("/wishlist/:id/move-to-cart", post(move_to_cart))
}

#[instrument(skip(state))]
pub async fn list_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<CartItem>>, AppError> {
    Ok(Json(CartService::from_ref(&state).list(user_id, false).await?))
}

#[instrument(skip(state))]
pub async fn list_wishlist(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<CartItem>>, AppError> {
    Ok(Json(CartService::from_ref(&state).list(user_id, true).await?))
}

#[instrument(skip(state, payload))]
pub async fn add_to_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<CartItem>), AppError> {
    let item = CartService::from_ref(&state)
        .add_to_cart(user_id, payload.book_id, payload.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

#[instrument(skip(state, payload))]
pub async fn add_to_wishlist(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<AddToWishlistRequest>,
) -> Result<(StatusCode, Json<CartItem>), AppError> {
    let item = CartService::from_ref(&state)
        .add_to_wishlist(user_id, payload.book_id)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

#[instrument(skip(state, payload))]
pub async fn update_quantity(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Result<Json<CartItem>, AppError> {
    let item = CartService::from_ref(&state)
        .update_quantity(user_id, id, payload.quantity)
        .await?;
    Ok(Json(item))
}

#[instrument(skip(state))]
pub async fn remove_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    CartService::from_ref(&state).remove_item(user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    CartService::from_ref(&state)
        .remove_from_wishlist(user_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn move_to_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<CartItem>, AppError> {
    let item = CartService::from_ref(&state).move_to_cart(user_id, id).await?;
    Ok(Json(item))
}
