//! Broker event handler: payment outcomes driving order transitions.

use std::sync::Arc;

use async_trait::async_trait;
use common::OrderId;
use messaging::{DedupKey, EventHandler, EventType, HandlerError};
use uuid::Uuid;

use crate::repository::{OrderRepository, TransitionOutcome};
use crate::service::OrderService;

/// Consumer group of the order service.
pub const CONSUMER_GROUP: &str = "order-service";

/// Applies payment outcomes to orders. `payment-cancelled` and
/// `payment-failed` both cancel the order; the distinction lives in the
/// payment service's records.
pub struct OrderEventHandler<R> {
    service: Arc<OrderService<R>>,
    group: String,
}

impl<R: OrderRepository> OrderEventHandler<R> {
    pub fn new(service: Arc<OrderService<R>>) -> Self {
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
impl<R: OrderRepository> EventHandler for OrderEventHandler<R> {
    async fn handle(
        &self,
        event_type: EventType,
        message_id: Uuid,
        payload: &serde_json::Value,
    ) -> Result<(), HandlerError> {
        // Payment outcome payloads carry the order id as the JSON value.
        let order_id: OrderId =
            serde_json::from_value(payload.clone()).map_err(HandlerError::permanent)?;
        let dedup = DedupKey::new(self.group.clone(), message_id);

        let outcome = match event_type {
            EventType::PaymentCompleted => self.service.mark_paid_from_event(order_id, dedup).await,
            EventType::PaymentCancelled | EventType::PaymentFailed => {
                self.service.cancel_from_event(order_id, dedup).await
            }
            other => {
                tracing::debug!(event_type = %other, "not an order event, ignoring");
                return Ok(());
            }
        };

        match outcome {
            Ok(TransitionOutcome::Applied(order)) => {
                tracing::info!(order_id = %order.id, status = %order.status, "order transitioned");
                Ok(())
            }
            Ok(TransitionOutcome::Duplicate) => {
                tracing::debug!(%message_id, "duplicate delivery, already applied");
                Ok(())
            }
            Err(err) if err.is_transient() => Err(HandlerError::transient(err)),
            Err(err) => Err(HandlerError::permanent(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use common::{Currency, DeliveryMethod, PaymentMethod, ProductId, UserId};
    use messaging::InMemoryOutboxStore;

    use crate::memory::InMemoryOrderRepository;
    use crate::model::{NewOrder, OrderLine};
    use crate::status::OrderStatus;

    fn setup() -> (
        OrderEventHandler<InMemoryOrderRepository>,
        Arc<OrderService<InMemoryOrderRepository>>,
    ) {
        let repo = InMemoryOrderRepository::new(InMemoryOutboxStore::new());
        let service = Arc::new(OrderService::new(repo));
        (OrderEventHandler::new(service.clone()), service)
    }

    async fn create_order(service: &OrderService<InMemoryOrderRepository>) -> OrderId {
        service
            .create_order(NewOrder {
                user_id: UserId::new(),
                currency: Currency::Usd,
                total_price: 100.0,
                payment_method: PaymentMethod::Card,
                delivery_method: DeliveryMethod::Pickup,
                delivery_address: "1 Main St".to_string(),
                delivery_date: Utc::now() + Duration::days(3),
                items: vec![OrderLine {
                    product_id: ProductId::new(),
                    quantity: 1,
                }],
                coupon: None,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn payment_completed_marks_the_order_paid() {
        let (handler, service) = setup();
        let order_id = create_order(&service).await;

        handler
            .handle(
                EventType::PaymentCompleted,
                Uuid::new_v4(),
                &serde_json::to_value(order_id).unwrap(),
            )
            .await
            .unwrap();

        let order = service.get_order(order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn payment_failed_and_cancelled_both_cancel() {
        for event_type in [EventType::PaymentFailed, EventType::PaymentCancelled] {
            let (handler, service) = setup();
            let order_id = create_order(&service).await;

            handler
                .handle(
                    event_type,
                    Uuid::new_v4(),
                    &serde_json::to_value(order_id).unwrap(),
                )
                .await
                .unwrap();

            let order = service.get_order(order_id).await.unwrap();
            assert_eq!(order.status, OrderStatus::Cancelled);
        }
    }

    #[tokio::test]
    async fn duplicate_delivery_is_acknowledged_quietly() {
        let (handler, service) = setup();
        let order_id = create_order(&service).await;

        let message_id = Uuid::new_v4();
        let payload = serde_json::to_value(order_id).unwrap();
        handler
            .handle(EventType::PaymentCompleted, message_id, &payload)
            .await
            .unwrap();
        handler
            .handle(EventType::PaymentCompleted, message_id, &payload)
            .await
            .unwrap();

        let order = service.get_order(order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn unknown_order_is_a_permanent_failure() {
        let (handler, _) = setup();

        let err = handler
            .handle(
                EventType::PaymentCompleted,
                Uuid::new_v4(),
                &serde_json::to_value(OrderId::new()).unwrap(),
            )
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn malformed_payload_is_permanent() {
        let (handler, _) = setup();

        let err = handler
            .handle(
                EventType::PaymentCompleted,
                Uuid::new_v4(),
                &serde_json::json!({"not": "a uuid"}),
            )
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }
}
