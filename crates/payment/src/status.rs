//! Payment status state machine.

use common::PaymentId;
use serde::{Deserialize, Serialize};

use crate::error::PaymentError;

/// The status of a payment attempt.
///
/// A payment leaves `pending` exactly once, except that an explicit retry
/// moves `cancelled` or `failed` back to `pending`:
/// ```text
///            ┌────────────► completed
/// pending ───┼────────────► cancelled ──┐
///    ▲       └────────────► failed ─────┤
///    └──────────── retry ◄──────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Awaiting the billing outcome.
    #[default]
    Pending,

    /// Billing succeeded (terminal unless refunded, which is out of scope).
    Completed,

    /// Cancelled by the user or by order cancellation.
    Cancelled,

    /// Billing failed.
    Failed,
}

impl PaymentStatus {
    /// Returns true if the state machine permits `self → target`.
    pub fn can_transition_to(&self, target: PaymentStatus) -> bool {
        matches!(
            (self, target),
            (PaymentStatus::Pending, PaymentStatus::Completed)
                | (PaymentStatus::Pending, PaymentStatus::Cancelled)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
                | (PaymentStatus::Cancelled, PaymentStatus::Pending)
                | (PaymentStatus::Failed, PaymentStatus::Pending)
        )
    }

    /// Checks a transition, naming why it was rejected.
    pub fn check_transition(
        &self,
        target: PaymentStatus,
        id: PaymentId,
    ) -> Result<(), PaymentError> {
        if self.can_transition_to(target) {
            return Ok(());
        }
        match (self, target) {
            (PaymentStatus::Completed, PaymentStatus::Pending) => {
                Err(PaymentError::PaymentAlreadyCompleted(id))
            }
            (PaymentStatus::Pending, PaymentStatus::Pending) => {
                Err(PaymentError::PaymentAlreadyPending(id))
            }
            _ => Err(PaymentError::InvalidPayment { id, status: *self }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Failed => "failed",
        }
    }

    /// Parses the stored form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "completed" => Some(PaymentStatus::Completed),
            "cancelled" => Some(PaymentStatus::Cancelled),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
