//! Broker event handler: quantity intents from the order service.

use std::sync::Arc;

use async_trait::async_trait;
use messaging::{DedupKey, EventHandler, EventType, HandlerError, OrderEvent};
use uuid::Uuid;

use crate::op::Operation;
use crate::repository::{BatchOutcome, InventoryRepository, QuantityLine};
use crate::service::InventoryService;

/// Consumer group of the inventory service.
pub const CONSUMER_GROUP: &str = "inventory-service";

/// Dispatches quantity intents to the reservation engine.
pub struct InventoryEventHandler<R> {
    service: Arc<InventoryService<R>>,
    group: String,
}

impl<R: InventoryRepository> InventoryEventHandler<R> {
    pub fn new(service: Arc<InventoryService<R>>) -> Self {
        Self {
            service,
            group: CONSUMER_GROUP.to_string(),
        }
    }

    /// Overrides the consumer group used for dedup bookkeeping.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }
}

#[async_trait]
impl<R: InventoryRepository> EventHandler for InventoryEventHandler<R> {
    async fn handle(
        &self,
        event_type: EventType,
        message_id: Uuid,
        payload: &serde_json::Value,
    ) -> Result<(), HandlerError> {
        let op = match event_type {
            EventType::QuantityRequested => Operation::Lock,
            EventType::QuantityReleased => Operation::Unlock,
            EventType::QuantitySubtracted => Operation::SubLocked,
            other => {
                tracing::debug!(event_type = %other, "not an inventory event, ignoring");
                return Ok(());
            }
        };

        let event: OrderEvent =
            serde_json::from_value(payload.clone()).map_err(HandlerError::permanent)?;
        let lines: Vec<QuantityLine> = event
            .items
            .iter()
            .map(|item| QuantityLine {
                product_id: item.product_id,
                quantity: item.quantity,
            })
            .collect();

        let dedup = DedupKey::new(self.group.clone(), message_id);
        match self.service.apply_event(&lines, op, dedup).await {
            Ok(BatchOutcome::Applied) => Ok(()),
            Ok(BatchOutcome::Duplicate) => {
                tracing::debug!(%message_id, "duplicate delivery, already applied");
                Ok(())
            }
            Err(err) if err.is_transient() => Err(HandlerError::transient(err)),
            Err(err) => Err(HandlerError::permanent(err)),
        }
    }
}
