//! Item resource.
//!
//! # Data Flow
//! ```text
//! /api/v1/items[/{id}] (already admitted by the gatekeeper)
//!     → handlers.rs (parse id, decode and validate body)
//!     → store.rs (ItemStore)
//!     → JSON response
//! ```

pub mod handlers;
pub mod model;
pub mod store;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use thiserror::Error;

use crate::http::response::json_error;

pub use handlers::SharedStore;
pub use model::{Item, ItemInput, ItemList};
pub use store::{ItemStore, MemoryItemStore};

pub const ITEMS_PATH: &str = "/api/v1/items";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    #[error("invalid item ID")]
    InvalidId,

    #[error("invalid input: {0}")]
    InvalidBody(String),

    #[error("{0}")]
    Validation(String),

    #[error("item not found")]
    NotFound,
}

impl ItemError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ItemError {
    fn into_response(self) -> Response {
        json_error(self.status(), self.to_string())
    }
}

/// Item routes with full paths, ready to be put behind the gatekeeper.
pub fn items_router(store: SharedStore) -> Router {
    Router::new()
        .route(
            ITEMS_PATH,
            get(handlers::list_items).post(handlers::create_item),
        )
        .route(
            "/api/v1/items/{id}",
            get(handlers::get_item)
                .put(handlers::update_item)
                .delete(handlers::delete_item),
        )
        .with_state(store)
}
