use axum::response::{IntoResponse, Response};
use serde_json::json;
use uuid::Uuid;

use crate::error::ApiError;

/// Error types for inventory operations
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("Insufficient stock for product {product_id}: {available} available, {requested} requested")]
    InsufficientStock {
        product_id: Uuid,
        available: i32,
        requested: i32,
    },

    #[error("Inventory tracking is disabled for product {0}")]
    TrackingDisabled(Uuid),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("SKU '{0}' already exists")]
    DuplicateSku(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::ProductNotFound(id) => ApiError::NotFound {
                resource: "Product".to_string(),
                id: id.to_string(),
            },
            InventoryError::InsufficientStock {
                product_id,
                available,
                requested,
            } => ApiError::Conflict {
                message: "Insufficient stock".to_string(),
                details: Some(json!({
                    "product_id": product_id,
                    "available": available,
                    "requested": requested,
                })),
            },
            err @ InventoryError::TrackingDisabled(_) => ApiError::Unprocessable {
                message: err.to_string(),
            },
            InventoryError::InvalidQuantity(message) => ApiError::BadRequest {
                message,
                details: None,
            },
            err @ InventoryError::DuplicateSku(_) => ApiError::Conflict {
                message: err.to_string(),
                details: None,
            },
            InventoryError::Database(e) => ApiError::DatabaseError(e),
        }
    }
}

impl IntoResponse for InventoryError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
