use common::Critical;
use thiserror::Error;

/// Errors surfaced by the broker, outbox, and relay components.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// The broker has been closed; consumers terminate cleanly on this.
    #[error("broker closed")]
    Closed,

    /// The broker rejected or failed a publish.
    #[error("publish failed: {0}")]
    Publish(String),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A serialization/deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Critical for MessagingError {
    fn is_critical(&self) -> bool {
        matches!(
            self,
            MessagingError::Publish(_) | MessagingError::Database(_)
        )
    }
}

/// Result type for messaging operations.
pub type Result<T> = std::result::Result<T, MessagingError>;
