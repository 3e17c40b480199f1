use std::sync::Arc;

use axum::extract::FromRef;
use thiserror::Error;
use tracing::{info, instrument};

use crate::books::repo::BookRepository;
use crate::cart::repo::CartRepository;
use crate::cart::repo_types::CartItem;
use crate::error::{AppError, RepoError};
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum CartError {
    #[error("{0}")]
    Validation(String),

    #[error("Book not found")]
    BookNotFound,

    #[error("Cart item not found")]
    ItemNotFound,

    #[error(transparent)]
    Repository(#[from] RepoError),
}

impl From<CartError> for AppError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::Validation(msg) => AppError::Validation(msg),
            CartError::BookNotFound | CartError::ItemNotFound => AppError::NotFound(e.to_string()),
            CartError::Repository(e) => AppError::Repository(e),
        }
    }
}

/// Cart and wishlist rules. There is at most one row per
/// (user, book, wishlist flag); adding a book already in the cart adds to its
/// quantity.
pub struct CartService {
    books: Arc<dyn BookRepository>,
    carts: Arc<dyn CartRepository>,
}

impl FromRef<AppState> for CartService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.books.clone(), state.carts.clone())
    }
}

fn positive_quantity(quantity: i32) -> Result<(), CartError> {
    if quantity < 1 {
        return Err(CartError::Validation("Quantity must be at least 1".into()));
    }
    Ok(())
}

impl CartService {
    pub fn new(books: Arc<dyn BookRepository>, carts: Arc<dyn CartRepository>) -> Self {
        Self { books, carts }
    }

    pub async fn list(&self, user_id: i64, wishlist: bool) -> Result<Vec<CartItem>, CartError> {
        Ok(self.carts.items_for_user(user_id, wishlist).await?)
    }

    #[instrument(skip(self))]
    pub async fn add_to_cart(
        &self,
        user_id: i64,
        book_id: i64,
        quantity: i32,
    ) -> Result<CartItem, CartError> {
        positive_quantity(quantity)?;
        self.ensure_book(book_id).await?;
        let item = self
            .carts
            .add_or_accumulate(user_id, book_id, quantity, false)
            .await?;
        info!(user_id = %user_id, book_id = %book_id, quantity = item.quantity, "cart updated");
        Ok(item)
    }

    #[instrument(skip(self))]
    pub async fn add_to_wishlist(&self, user_id: i64, book_id: i64) -> Result<CartItem, CartError> {
        self.ensure_book(book_id).await?;
        Ok(self.carts.add_or_accumulate(user_id, book_id, 1, true).await?)
    }

    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user_id: i64,
        item_id: i64,
        quantity: i32,
    ) -> Result<CartItem, CartError> {
        positive_quantity(quantity)?;
        self.carts
            .set_quantity(user_id, item_id, quantity)
            .await?
            .ok_or(CartError::ItemNotFound)
    }

    #[instrument(skip(self))]
    pub async fn remove_item(&self, user_id: i64, item_id: i64) -> Result<(), CartError> {
        self.delete(user_id, item_id, false).await
    }

    #[instrument(skip(self))]
    pub async fn remove_from_wishlist(&self, user_id: i64, item_id: i64) -> Result<(), CartError> {
        self.delete(user_id, item_id, true).await
    }

    /// Moves a wishlist entry into the cart with quantity 1.
    #[instrument(skip(self))]
    pub async fn move_to_cart(&self, user_id: i64, item_id: i64) -> Result<CartItem, CartError> {
        let item = self
            .carts
            .move_to_cart(user_id, item_id)
            .await?
            .ok_or(CartError::ItemNotFound)?;
        info!(user_id = %user_id, book_id = %item.book_id, quantity = item.quantity, "moved to cart");
        Ok(item)
    }

    async fn delete(&self, user_id: i64, item_id: i64, wishlist: bool) -> Result<(), CartError> {
        if self.carts.delete_item(user_id, item_id, wishlist).await? {
            Ok(())
        } else {
            Err(CartError::ItemNotFound)
        }
    }

    async fn ensure_book(&self, book_id: i64) -> Result<(), CartError> {
        match self.books.find_by_id(book_id).await? {
            Some(_) => Ok(()),
            None => Err(CartError::BookNotFound),
        }
    }
}
