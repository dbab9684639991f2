use common::{Critical, ProductId};
use thiserror::Error;

/// Errors surfaced by the reservation engine.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The product has no inventory row.
    #[error("product not found: {product_id}")]
    ProductNotFound { product_id: ProductId },

    /// The pool the operation draws from holds fewer units than requested.
    #[error(
        "not enough quantity for product {product_id}: requested {requested}, held {held}"
    )]
    NotEnoughQuantity {
        product_id: ProductId,
        requested: u64,
        held: u64,
    },

    /// The operation string is not part of the command set. Permanent:
    /// must never be retried.
    #[error("unknown operation: {0:?}")]
    OperationUnknown(String),

    /// A database error occurred. Transient: the broker will redeliver.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl InventoryError {
    /// Returns true if retrying can succeed (storage trouble, not a
    /// domain rejection).
    pub fn is_transient(&self) -> bool {
        matches!(self, InventoryError::Database(_))
    }
}

impl Critical for InventoryError {
    fn is_critical(&self) -> bool {
        self.is_transient()
    }
}

/// Result type for inventory operations.
pub type Result<T> = std::result::Result<T, InventoryError>;
