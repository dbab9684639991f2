//! Repository seam for the order service.

use async_trait::async_trait;
use common::{OrderId, UserId};
use messaging::{DedupKey, OutboxRecord};

use crate::coupon::Coupon;
use crate::error::Result;
use crate::model::Order;
use crate::status::OrderStatus;

/// Result of a deduplicated status transition.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// The transition ran and committed; carries the updated order.
    Applied(Order),
    /// The message key was already recorded; nothing changed.
    Duplicate,
}

/// Builds the outbox rows a transition emits, given the order as read
/// inside the transaction (before the status change).
pub type EventFactory<'a> = &'a (dyn Fn(&Order) -> Result<Vec<OutboxRecord>> + Sync);

/// Persistent store of orders, coupons, and the order outbox.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Inserts the order and its outbox rows in one transaction.
    async fn create(&self, order: &Order, outbox: &[OutboxRecord]) -> Result<()>;

    async fn get(&self, id: OrderId) -> Result<Option<Order>>;

    /// Lists orders, optionally restricted to one user, newest first.
    async fn list(&self, user_id: Option<UserId>) -> Result<Vec<Order>>;

    /// Overwrites the mutable (delivery) fields.
    async fn update(&self, order: &Order) -> Result<()>;

    /// Removes the row. Returns false if it did not exist.
    async fn delete(&self, id: OrderId) -> Result<bool>;

    async fn get_coupon(&self, code: &str) -> Result<Option<Coupon>>;

    /// Read-modify-write of the order status.
    ///
    /// Inside one transaction: claims `dedup` (when given), loads the row
    /// with a lock, checks the state machine, applies `target`, and appends
    /// the rows produced by `events`. Rejected transitions surface the
    /// typed error from [`OrderStatus::check_transition`].
    async fn transition(
        &self,
        id: OrderId,
        target: OrderStatus,
        action: &'static str,
        events: EventFactory<'_>,
        dedup: Option<DedupKey>,
    ) -> Result<TransitionOutcome>;
}
