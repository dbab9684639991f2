use common::{Critical, OrderId, PaymentId};
use messaging::MessagingError;
use thiserror::Error;

use crate::billing::BillingError;
use crate::status::PaymentStatus;

/// Errors surfaced by the payment service.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Input failed validation (non-positive price, unsupported method).
    #[error("invalid payment: {0}")]
    InvalidArgument(String),

    /// The payment does not exist (or belongs to another user).
    #[error("payment not found: {0}")]
    NotFound(PaymentId),

    /// A payment already exists for this order.
    #[error("payment already exists for order {order_id}")]
    AlreadyExists { order_id: OrderId },

    /// Retry of a payment that already completed.
    #[error("payment already completed: {0}")]
    PaymentAlreadyCompleted(PaymentId),

    /// Retry of a payment that is still pending.
    #[error("payment already pending: {0}")]
    PaymentAlreadyPending(PaymentId),

    /// The payment is not in a state this operation accepts.
    #[error("invalid payment {id}: status is {status}")]
    InvalidPayment {
        id: PaymentId,
        status: PaymentStatus,
    },

    /// The billing collaborator failed.
    #[error("billing error: {0}")]
    Billing(#[from] BillingError),

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

impl PaymentError {
    /// Returns true if retrying can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PaymentError::Database(_) | PaymentError::Messaging(_)
        )
    }
}

impl Critical for PaymentError {
    fn is_critical(&self) -> bool {
        matches!(
            self,
            PaymentError::Billing(_) | PaymentError::Database(_) | PaymentError::Messaging(_)
        )
    }
}

/// Result type for payment operations.
pub type Result<T> = std::result::Result<T, PaymentError>;
