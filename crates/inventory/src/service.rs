//! High-level inventory operations backing the RPC surface and the
//! event consumer.

use common::ProductId;
use messaging::DedupKey;

use crate::error::{InventoryError, Result};
use crate::item::InventoryItem;
use crate::op::Operation;
use crate::repository::{BatchOutcome, InventoryRepository, QuantityLine};

/// Service wrapping a repository with the quantity operation set.
pub struct InventoryService<R> {
    repo: R,
}

impl<R: InventoryRepository> InventoryService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Looks up one row; missing products are an error here, unlike `get`
    /// on the repository.
    #[tracing::instrument(skip(self))]
    pub async fn get_item(&self, product_id: ProductId) -> Result<InventoryItem> {
        self.repo
            .get(product_id)
            .await?
            .ok_or(InventoryError::ProductNotFound { product_id })
    }

    /// Applies an operation given in wire form to one product.
    #[tracing::instrument(skip(self))]
    pub async fn set_item(
        &self,
        product_id: ProductId,
        quantity: u64,
        op: &str,
    ) -> Result<InventoryItem> {
        let op = Operation::parse(op)?;
        self.repo.apply(product_id, quantity, op).await
    }

    /// Applies an operation given in wire form to a batch of products,
    /// atomically.
    #[tracing::instrument(skip(self, lines))]
    pub async fn set_items(&self, lines: &[QuantityLine], op: &str) -> Result<()> {
        let op = Operation::parse(op)?;
        self.repo.apply_many(lines, op, None).await?;
        Ok(())
    }

    /// Returns true iff every line could be reserved right now.
    /// Missing products fail `ProductNotFound`.
    #[tracing::instrument(skip(self, lines))]
    pub async fn is_reservable(&self, lines: &[QuantityLine]) -> Result<bool> {
        for line in lines {
            let item = self
                .repo
                .get(line.product_id)
                .await?
                .ok_or(InventoryError::ProductNotFound {
                    product_id: line.product_id,
                })?;
            if !item.can_reserve(line.quantity) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub async fn add(&self, product_id: ProductId, quantity: u64) -> Result<InventoryItem> {
        self.repo.apply(product_id, quantity, Operation::Add).await
    }

    pub async fn sub(&self, product_id: ProductId, quantity: u64) -> Result<InventoryItem> {
        self.repo.apply(product_id, quantity, Operation::Sub).await
    }

    pub async fn lock(&self, product_id: ProductId, quantity: u64) -> Result<InventoryItem> {
        self.repo.apply(product_id, quantity, Operation::Lock).await
    }

    pub async fn unlock(&self, product_id: ProductId, quantity: u64) -> Result<InventoryItem> {
        self.repo
            .apply(product_id, quantity, Operation::Unlock)
            .await
    }

    pub async fn sub_locked(&self, product_id: ProductId, quantity: u64) -> Result<InventoryItem> {
        self.repo
            .apply(product_id, quantity, Operation::SubLocked)
            .await
    }

    /// Event-layer entry point: applies a deduplicated batch.
    #[tracing::instrument(skip(self, lines, dedup))]
    pub async fn apply_event(
        &self,
        lines: &[QuantityLine],
        op: Operation,
        dedup: DedupKey,
    ) -> Result<BatchOutcome> {
        let outcome = self.repo.apply_many(lines, op, Some(dedup)).await?;
        if outcome == BatchOutcome::Applied {
            metrics::counter!("inventory_batches_applied_total", "op" => op.as_str()).increment(1);
        }
        Ok(outcome)
    }
}
