//! Repository seam for the reservation engine.

use async_trait::async_trait;
use common::ProductId;
use messaging::DedupKey;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::item::InventoryItem;
use crate::op::Operation;

/// One `(product, quantity)` line of a batch command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityLine {
    pub product_id: ProductId,
    pub quantity: u64,
}

/// Whether a deduplicated batch actually ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// The batch was applied and committed.
    Applied,
    /// The message key was already recorded; nothing was changed.
    Duplicate,
}

/// Persistent store of inventory rows.
///
/// Implementations serialize concurrent writers per product row (the
/// Postgres store via `SELECT ... FOR UPDATE`) and run every batch inside a
/// single transaction: either all lines advance or none do.
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    /// Reads one row. `None` if the product was never added.
    async fn get(&self, product_id: ProductId) -> Result<Option<InventoryItem>>;

    /// Read-modify-write of a single row. `add` creates missing rows; every
    /// other operation fails `ProductNotFound` on them.
    async fn apply(
        &self,
        product_id: ProductId,
        quantity: u64,
        op: Operation,
    ) -> Result<InventoryItem>;

    /// Applies `op` to every line in one transaction. Lines are processed
    /// in `product_id` order regardless of input order, keeping concurrent
    /// batches deterministic. When `dedup` is given and its key was already
    /// claimed, returns [`BatchOutcome::Duplicate`] without touching rows.
    async fn apply_many(
        &self,
        lines: &[QuantityLine],
        op: Operation,
        dedup: Option<DedupKey>,
    ) -> Result<BatchOutcome>;
}

/// Returns the lines sorted by product id, the canonical batch order.
pub(crate) fn sorted_lines(lines: &[QuantityLine]) -> Vec<QuantityLine> {
    let mut sorted = lines.to_vec();
    sorted.sort_by_key(|line| line.product_id);
    sorted
}
