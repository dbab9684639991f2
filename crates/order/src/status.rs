//! Order status state machine.

use common::OrderId;
use serde::{Deserialize, Serialize};

use crate::error::OrderError;

/// The status of an order in its lifecycle.
///
/// Transitions:
/// ```text
/// pending ──► paid ──► completed
///    │          │
///    └──────────┴──► cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Created, awaiting payment.
    #[default]
    Pending,

    /// Payment completed, awaiting fulfilment.
    Paid,

    /// Fulfilled (terminal).
    Completed,

    /// Cancelled by the user or by a payment failure (terminal).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if the state machine permits `self → target`.
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        matches!(
            (self, target),
            (OrderStatus::Pending, OrderStatus::Paid)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Paid, OrderStatus::Completed)
                | (OrderStatus::Paid, OrderStatus::Cancelled)
        )
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Checks a transition, naming why it was rejected.
    pub fn check_transition(
        &self,
        target: OrderStatus,
        action: &'static str,
        id: OrderId,
    ) -> Result<(), OrderError> {
        if self.can_transition_to(target) {
            return Ok(());
        }
        match self {
            OrderStatus::Completed => Err(OrderError::AlreadyCompleted(id)),
            OrderStatus::Cancelled => Err(OrderError::AlreadyCancelled(id)),
            _ => Err(OrderError::InvalidStatus {
                status: *self,
                action,
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Parses the stored form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "paid" => Some(OrderStatus::Paid),
            "completed" => Some(OrderStatus::Completed),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
