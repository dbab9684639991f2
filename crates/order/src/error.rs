use common::{Critical, OrderId};
use messaging::MessagingError;
use thiserror::Error;

use crate::status::OrderStatus;

/// Errors surfaced by the order service.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Input failed validation (empty items, bad price, past delivery date).
    #[error("invalid order: {0}")]
    InvalidArgument(String),

    /// The order does not exist.
    #[error("order not found: {0}")]
    NotFound(OrderId),

    /// The coupon code does not exist.
    #[error("coupon not found: {0:?}")]
    CouponNotFound(String),

    /// The coupon's validity window has passed.
    #[error("coupon expired: {0:?}")]
    CouponExpired(String),

    /// The coupon exists but is switched off.
    #[error("coupon not active: {0:?}")]
    CouponNotActive(String),

    /// The order already reached `completed`.
    #[error("order already completed: {0}")]
    AlreadyCompleted(OrderId),

    /// The order already reached `cancelled`.
    #[error("order already cancelled: {0}")]
    AlreadyCancelled(OrderId),

    /// The requested transition is not in the state machine.
    #[error("invalid order status {status} for {action}")]
    InvalidStatus {
        status: OrderStatus,
        action: &'static str,
    },

    /// A database error occurred. Transient.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A serialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Building or storing an outbox row failed.
    #[error("messaging error: {0}")]
    Messaging(#[from] MessagingError),
}

impl OrderError {
    /// Returns true if retrying can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, OrderError::Database(_) | OrderError::Messaging(_))
    }
}

impl Critical for OrderError {
    fn is_critical(&self) -> bool {
        self.is_transient()
    }
}

/// Result type for order operations.
pub type Result<T> = std::result::Result<T, OrderError>;
