use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::extractors::AdminUser,
    books::repo_types::{Book, BookInput},
    error::AppError,
    state::AppState,
};

pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/books", get(list_books))
        .route("/books/:id", get(get_book))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/books", post(create_book))
        .route("/admin/books/:id", put(update_book).delete(delete_book))
}

#[instrument(skip(state))]
pub async fn list_books(State(state): State<AppState>) -> Result<Json<Vec<Book>>, AppError> {
    Ok(Json(state.books.list().await?))
}

#[instrument(skip(state))]
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Book>, AppError> {
    state
        .books
        .find_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Book not found".into()))
}

#[instrument(skip(state, payload))]
pub async fn create_book(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Json(payload): Json<BookInput>,
) -> Result<(StatusCode, Json<Book>), AppError> {
    payload.validate().map_err(AppError::Validation)?;
    let book = state.books.create(&payload).await?;
    info!(admin_id = %admin_id, book_id = %book.id, "book created");
    Ok((StatusCode::CREATED, Json(book)))
}

#[instrument(skip(state, payload))]
pub async fn update_book(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Path(id): Path<i64>,
    Json(payload): Json<BookInput>,
) -> Result<Json<Book>, AppError> {
    payload.validate().map_err(AppError::Validation)?;
    let book = state
        .books
        .update(id, &payload)
        .await?
        .ok_or_else(|| AppError::NotFound("Book not found".into()))?;
    info!(admin_id = %admin_id, book_id = %id, "book updated");
    Ok(Json(book))
}

#[instrument(skip(state))]
pub async fn delete_book(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    match state.books.delete(id).await {
        Ok(true) => {
            info!(admin_id = %admin_id, book_id = %id, "book deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        Ok(false) => Err(AppError::NotFound("Book not found".into())),
        Err(e) if e.is_foreign_key_violation() => {
            warn!(book_id = %id, "book is referenced by orders");
            Err(AppError::Conflict("Book is referenced by existing orders".into()))
        }
        Err(e) => Err(e.into()),
    }
}
