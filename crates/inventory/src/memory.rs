//! In-memory repository for tests and the single-process binary.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::ProductId;
use messaging::DedupKey;
use uuid::Uuid;

use crate::error::{InventoryError, Result};
use crate::item::InventoryItem;
use crate::op::Operation;
use crate::repository::{BatchOutcome, InventoryRepository, QuantityLine, sorted_lines};

#[derive(Debug, Default)]
struct State {
    items: HashMap<ProductId, InventoryItem>,
    processed: HashSet<(String, Uuid)>,
}

/// In-memory inventory repository with the same semantics as the Postgres
/// implementation: batches apply atomically and dedup keys are claimed
/// together with the write.
#[derive(Clone, Default)]
pub struct InMemoryInventoryRepository {
    state: Arc<Mutex<State>>,
}

impl InMemoryInventoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a row directly (test setup).
    pub fn seed(&self, product_id: ProductId, available: u64, reserved: u64) {
        self.state.lock().unwrap().items.insert(
            product_id,
            InventoryItem {
                product_id,
                available,
                reserved,
            },
        );
    }

    fn apply_one(
        items: &mut HashMap<ProductId, InventoryItem>,
        product_id: ProductId,
        quantity: u64,
        op: Operation,
    ) -> Result<InventoryItem> {
        let item = match items.get_mut(&product_id) {
            Some(item) => item,
            None if op.creates_row() => items
                .entry(product_id)
                .or_insert_with(|| InventoryItem::new(product_id)),
            None => return Err(InventoryError::ProductNotFound { product_id }),
        };
        op.apply(item, quantity)?;
        Ok(*item)
    }
}

#[async_trait]
impl InventoryRepository for InMemoryInventoryRepository {
    async fn get(&self, product_id: ProductId) -> Result<Option<InventoryItem>> {
        Ok(self.state.lock().unwrap().items.get(&product_id).copied())
    }

    async fn apply(
        &self,
        product_id: ProductId,
        quantity: u64,
        op: Operation,
    ) -> Result<InventoryItem> {
        let mut state = self.state.lock().unwrap();
        Self::apply_one(&mut state.items, product_id, quantity, op)
    }

    async fn apply_many(
        &self,
        lines: &[QuantityLine],
        op: Operation,
        dedup: Option<DedupKey>,
    ) -> Result<BatchOutcome> {
        let mut state = self.state.lock().unwrap();

        if let Some(key) = &dedup {
            if state
                .processed
                .contains(&(key.consumer_group.clone(), key.message_id))
            {
                return Ok(BatchOutcome::Duplicate);
            }
        }

        // Work on a copy so a failing line leaves every row untouched.
        let mut staged = state.items.clone();
        for line in sorted_lines(lines) {
            Self::apply_one(&mut staged, line.product_id, line.quantity, op)?;
        }
        state.items = staged;

        if let Some(key) = dedup {
            state.processed.insert((key.consumer_group, key.message_id));
        }
        Ok(BatchOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product_id: ProductId, quantity: u64) -> QuantityLine {
        QuantityLine {
            product_id,
            quantity,
        }
    }

    #[tokio::test]
    async fn add_creates_missing_rows() {
        let repo = InMemoryInventoryRepository::new();
        let product = ProductId::new();

        let item = repo.apply(product, 5, Operation::Add).await.unwrap();
        assert_eq!((item.available, item.reserved), (5, 0));
    }

    #[tokio::test]
    async fn non_add_on_missing_row_is_product_not_found() {
        let repo = InMemoryInventoryRepository::new();
        let result = repo.apply(ProductId::new(), 1, Operation::Lock).await;
        assert!(matches!(
            result,
            Err(InventoryError::ProductNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn failing_line_rolls_back_the_whole_batch() {
        let repo = InMemoryInventoryRepository::new();
        let a = ProductId::new();
        let b = ProductId::new();
        repo.seed(a, 10, 0);
        repo.seed(b, 1, 0);

        let result = repo
            .apply_many(&[line(a, 5), line(b, 5)], Operation::Lock, None)
            .await;
        assert!(matches!(
            result,
            Err(InventoryError::NotEnoughQuantity { .. })
        ));

        // Neither row moved, including the one that could have succeeded.
        let item_a = repo.get(a).await.unwrap().unwrap();
        assert_eq!((item_a.available, item_a.reserved), (10, 0));
    }

    #[tokio::test]
    async fn duplicate_dedup_key_skips_the_batch() {
        let repo = InMemoryInventoryRepository::new();
        let product = ProductId::new();
        repo.seed(product, 5, 0);

        let key = DedupKey::new("inventory-service", Uuid::new_v4());
        let first = repo
            .apply_many(&[line(product, 2)], Operation::Lock, Some(key.clone()))
            .await
            .unwrap();
        let second = repo
            .apply_many(&[line(product, 2)], Operation::Lock, Some(key))
            .await
            .unwrap();

        assert_eq!(first, BatchOutcome::Applied);
        assert_eq!(second, BatchOutcome::Duplicate);

        let item = repo.get(product).await.unwrap().unwrap();
        assert_eq!((item.available, item.reserved), (3, 2));
    }

    #[tokio::test]
    async fn failed_batch_does_not_claim_the_dedup_key() {
        let repo = InMemoryInventoryRepository::new();
        let product = ProductId::new();
        repo.seed(product, 1, 0);

        let key = DedupKey::new("inventory-service", Uuid::new_v4());
        let failed = repo
            .apply_many(&[line(product, 5)], Operation::Lock, Some(key.clone()))
            .await;
        assert!(failed.is_err());

        // Stock arrives, the redelivered message must still apply.
        repo.apply(product, 10, Operation::Add).await.unwrap();
        let retried = repo
            .apply_many(&[line(product, 5)], Operation::Lock, Some(key))
            .await
            .unwrap();
        assert_eq!(retried, BatchOutcome::Applied);
    }
}
