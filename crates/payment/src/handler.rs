//! Broker event handler: order lifecycle events driving payments.

use std::sync::Arc;

use async_trait::async_trait;
use messaging::{DedupKey, EventHandler, EventType, HandlerError, OrderEvent};
use uuid::Uuid;

use crate::repository::{CreateOutcome, PaymentRepository, PaymentTransition};
use crate::service::PaymentService;

/// Consumer group of the payment service.
pub const CONSUMER_GROUP: &str = "payment-service";

/// Creates payments for new orders and cancels them with cancelled orders.
pub struct PaymentEventHandler<R> {
    service: Arc<PaymentService<R>>,
    group: String,
}

impl<R: PaymentRepository> PaymentEventHandler<R> {
    pub fn new(service: Arc<PaymentService<R>>) -> Self {
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
impl<R: PaymentRepository> EventHandler for PaymentEventHandler<R> {
    async fn handle(
        &self,
        event_type: EventType,
        message_id: Uuid,
        payload: &serde_json::Value,
    ) -> Result<(), HandlerError> {
        let dedup = DedupKey::new(self.group.clone(), message_id);
        match event_type {
            EventType::OrderCreated => {
                let event: OrderEvent =
                    serde_json::from_value(payload.clone()).map_err(HandlerError::permanent)?;
                match self.service.create_from_event(&event, dedup).await {
                    Ok(CreateOutcome::Created) => Ok(()),
                    Ok(CreateOutcome::Duplicate) => {
                        tracing::debug!(%message_id, "duplicate delivery, already applied");
                        Ok(())
                    }
                    Err(err) if err.is_transient() => Err(HandlerError::transient(err)),
                    Err(err) => Err(HandlerError::permanent(err)),
                }
            }
            EventType::OrderCancelled => {
                let event: OrderEvent =
                    serde_json::from_value(payload.clone()).map_err(HandlerError::permanent)?;
                match self.service.cancel_from_event(event.order_id, dedup).await {
                    Ok(PaymentTransition::Applied(payment)) => {
                        tracing::info!(payment_id = %payment.id, "payment cancelled with order");
                        Ok(())
                    }
                    Ok(PaymentTransition::Duplicate) => Ok(()),
                    Err(err) if err.is_transient() => Err(HandlerError::transient(err)),
                    Err(err) => Err(HandlerError::permanent(err)),
                }
            }
            other => {
                tracing::debug!(event_type = %other, "not a payment event, ignoring");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Currency, OrderId, PaymentMethod, ProductId, UserId};
    use messaging::{InMemoryOutboxStore, OrderEventItem};

    use crate::memory::InMemoryPaymentRepository;
    use crate::status::PaymentStatus;

    fn setup() -> (
        PaymentEventHandler<InMemoryPaymentRepository>,
        InMemoryPaymentRepository,
    ) {
        let repo = InMemoryPaymentRepository::new(InMemoryOutboxStore::new());
        let service = Arc::new(PaymentService::new(repo.clone()));
        (PaymentEventHandler::new(service), repo)
    }

    fn order_event(order_id: OrderId) -> serde_json::Value {
        serde_json::to_value(OrderEvent {
            order_id,
            user_id: UserId::new(),
            currency: Currency::Usd,
            total_price: 100.0,
            payment_method: PaymentMethod::Card,
            description: "Order".to_string(),
            items: vec![OrderEventItem {
                product_id: ProductId::new(),
                quantity: 1,
            }],
        })
        .unwrap()
    }

    #[tokio::test]
    async fn order_created_persists_a_pending_payment() {
        let (handler, repo) = setup();
        let order_id = OrderId::new();

        handler
            .handle(EventType::OrderCreated, Uuid::new_v4(), &order_event(order_id))
            .await
            .unwrap();

        let payment = repo.get_by_order(order_id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn redelivered_order_created_creates_one_payment() {
        let (handler, repo) = setup();
        let order_id = OrderId::new();
        let message_id = Uuid::new_v4();
        let payload = order_event(order_id);

        handler
            .handle(EventType::OrderCreated, message_id, &payload)
            .await
            .unwrap();
        handler
            .handle(EventType::OrderCreated, message_id, &payload)
            .await
            .unwrap();

        assert!(repo.get_by_order(order_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn order_cancelled_cancels_the_pending_payment() {
        let (handler, repo) = setup();
        let order_id = OrderId::new();
        let payload = order_event(order_id);

        handler
            .handle(EventType::OrderCreated, Uuid::new_v4(), &payload)
            .await
            .unwrap();
        handler
            .handle(EventType::OrderCancelled, Uuid::new_v4(), &payload)
            .await
            .unwrap();

        let payment = repo.get_by_order(order_id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Cancelled);

        let rows = repo.outbox().rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].event_type, "payment-cancelled");
    }

    #[tokio::test]
    async fn order_cancelled_for_settled_payment_is_permanent() {
        let (handler, repo) = setup();
        let order_id = OrderId::new();
        let payload = order_event(order_id);

        handler
            .handle(EventType::OrderCreated, Uuid::new_v4(), &payload)
            .await
            .unwrap();
        let payment = repo.get_by_order(order_id).await.unwrap().unwrap();
        repo.transition(payment.id, PaymentStatus::Completed, None, &[], None)
            .await
            .unwrap();

        let err = handler
            .handle(EventType::OrderCancelled, Uuid::new_v4(), &payload)
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn malformed_payload_is_permanent() {
        let (handler, _) = setup();
        let err = handler
            .handle(
                EventType::OrderCreated,
                Uuid::new_v4(),
                &serde_json::json!([1, 2, 3]),
            )
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn unrelated_events_are_ignored() {
        let (handler, repo) = setup();
        handler
            .handle(
                EventType::QuantityRequested,
                Uuid::new_v4(),
                &order_event(OrderId::new()),
            )
            .await
            .unwrap();
        assert_eq!(repo.list_pending(10).await.unwrap().len(), 0);
    }
}
