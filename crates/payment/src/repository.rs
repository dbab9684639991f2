//! Repository seam for the payment service.

use async_trait::async_trait;
use common::{OrderId, PaymentId};
use messaging::{DedupKey, OutboxRecord};

use crate::error::Result;
use crate::model::Payment;
use crate::status::PaymentStatus;

/// Result of a deduplicated insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// The message key was already recorded; nothing was inserted.
    Duplicate,
}

/// Result of a deduplicated status transition.
#[derive(Debug, Clone)]
pub enum PaymentTransition {
    /// The transition ran and committed; carries the updated payment.
    Applied(Payment),
    /// The message key was already recorded; nothing changed.
    Duplicate,
}

/// Persistent store of payments and the payment outbox.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Inserts a payment. A second payment for the same order fails
    /// `AlreadyExists`; a claimed `dedup` key returns
    /// [`CreateOutcome::Duplicate`].
    async fn create(&self, payment: &Payment, dedup: Option<DedupKey>) -> Result<CreateOutcome>;

    async fn get(&self, id: PaymentId) -> Result<Option<Payment>>;

    async fn get_by_order(&self, order_id: OrderId) -> Result<Option<Payment>>;

    /// Oldest pending payments, for the billing driver.
    async fn list_pending(&self, limit: i64) -> Result<Vec<Payment>>;

    /// Read-modify-write of the payment status.
    ///
    /// Inside one transaction: claims `dedup` (when given), loads the row
    /// with a lock, checks the state machine, applies `target` (and
    /// `redirect_url` when given), and appends the outbox rows. Rejected
    /// transitions surface the typed error from
    /// [`PaymentStatus::check_transition`].
    async fn transition(
        &self,
        id: PaymentId,
        target: PaymentStatus,
        redirect_url: Option<&str>,
        outbox: &[OutboxRecord],
        dedup: Option<DedupKey>,
    ) -> Result<PaymentTransition>;
}
