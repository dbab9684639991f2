//! High-level order operations backing the RPC surface and the consumer.

use chrono::Utc;
use common::{OrderId, UserId};
use messaging::{DedupKey, EventType, OutboxRecord};

use crate::error::{OrderError, Result};
use crate::model::{DeliveryUpdate, NewOrder, Order};
use crate::repository::{OrderRepository, TransitionOutcome};
use crate::status::OrderStatus;

/// Service for managing orders.
pub struct OrderService<R> {
    repo: R,
}

impl<R: OrderRepository> OrderService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a pending order.
    ///
    /// Resolves the coupon (if any), validates and prices the order, then
    /// in one transaction inserts the row and appends the `order-created`
    /// and `quantity-requested` outbox rows.
    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn create_order(&self, request: NewOrder) -> Result<Order> {
        let now = Utc::now();

        let mut price = request.total_price;
        if let Some(code) = &request.coupon {
            let coupon = self
                .repo
                .get_coupon(code)
                .await?
                .ok_or_else(|| OrderError::CouponNotFound(code.clone()))?;
            coupon.check(now)?;
            price = coupon.apply(price);
        }

        let order = Order::create(&request, price, now)?;
        let event = order.to_event();
        let records = vec![
            OutboxRecord::for_event(EventType::OrderCreated, &event)?,
            OutboxRecord::for_event(EventType::QuantityRequested, &event)?,
        ];

        self.repo.create(&order, &records).await?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(order_id = %order.id, total = order.total_price, "order created");
        Ok(order)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, id: OrderId) -> Result<Order> {
        self.repo.get(id).await?.ok_or(OrderError::NotFound(id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, user_id: Option<UserId>) -> Result<Vec<Order>> {
        self.repo.list(user_id).await
    }

    /// Updates the delivery fields of a pending order.
    #[tracing::instrument(skip(self, update))]
    pub async fn update_order(&self, id: OrderId, update: DeliveryUpdate) -> Result<Order> {
        let mut order = self.get_order(id).await?;
        order.apply_delivery_update(update, Utc::now())?;
        self.repo.update(&order).await?;
        Ok(order)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_order(&self, id: OrderId) -> Result<()> {
        if !self.repo.delete(id).await? {
            return Err(OrderError::NotFound(id));
        }
        Ok(())
    }

    /// `paid → completed`, appending `order-completed`.
    #[tracing::instrument(skip(self))]
    pub async fn complete_order(&self, id: OrderId) -> Result<Order> {
        let outcome = self
            .repo
            .transition(
                id,
                OrderStatus::Completed,
                "complete",
                &|order| {
                    Ok(vec![OutboxRecord::for_event(
                        EventType::OrderCompleted,
                        &order.to_event(),
                    )?])
                },
                None,
            )
            .await?;
        metrics::counter!("orders_completed_total").increment(1);
        Ok(expect_applied(outcome))
    }

    /// User cancellation: `pending|paid → cancelled`, appending
    /// `order-cancelled`. Cancelling from `pending` also releases the
    /// reservation with `quantity-released`; from `paid` the stock was
    /// already subtracted and refunds are out of scope.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, id: OrderId) -> Result<Order> {
        let outcome = self
            .repo
            .transition(id, OrderStatus::Cancelled, "cancel", &cancel_events, None)
            .await?;
        metrics::counter!("orders_cancelled_total").increment(1);
        Ok(expect_applied(outcome))
    }

    /// Consumer entry point for `payment-completed`: `pending → paid`,
    /// appending `quantity-subtracted` so the reservation is consumed.
    #[tracing::instrument(skip(self, dedup))]
    pub async fn mark_paid_from_event(
        &self,
        id: OrderId,
        dedup: DedupKey,
    ) -> Result<TransitionOutcome> {
        self.repo
            .transition(
                id,
                OrderStatus::Paid,
                "pay",
                &|order| {
                    Ok(vec![OutboxRecord::for_event(
                        EventType::QuantitySubtracted,
                        &order.to_event(),
                    )?])
                },
                Some(dedup),
            )
            .await
    }

    /// Consumer entry point for `payment-cancelled`/`payment-failed`.
    #[tracing::instrument(skip(self, dedup))]
    pub async fn cancel_from_event(
        &self,
        id: OrderId,
        dedup: DedupKey,
    ) -> Result<TransitionOutcome> {
        self.repo
            .transition(
                id,
                OrderStatus::Cancelled,
                "cancel on payment failure",
                &cancel_events,
                Some(dedup),
            )
            .await
    }
}

fn cancel_events(order: &Order) -> Result<Vec<OutboxRecord>> {
    let event = order.to_event();
    let mut records = vec![OutboxRecord::for_event(EventType::OrderCancelled, &event)?];
    if order.status == OrderStatus::Pending {
        records.push(OutboxRecord::for_event(EventType::QuantityReleased, &event)?);
    }
    Ok(records)
}

fn expect_applied(outcome: TransitionOutcome) -> Order {
    match outcome {
        TransitionOutcome::Applied(order) => order,
        // Transitions without a dedup key always apply.
        TransitionOutcome::Duplicate => unreachable!("transition without dedup reported duplicate"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common::{Currency, DeliveryMethod, PaymentMethod, ProductId};
    use messaging::InMemoryOutboxStore;
    use uuid::Uuid;

    use crate::coupon::Coupon;
    use crate::memory::InMemoryOrderRepository;
    use crate::model::OrderLine;

    fn service() -> (
        OrderService<InMemoryOrderRepository>,
        InMemoryOrderRepository,
    ) {
        let repo = InMemoryOrderRepository::new(InMemoryOutboxStore::new());
        (OrderService::new(repo.clone()), repo)
    }

    fn request() -> NewOrder {
        NewOrder {
            user_id: UserId::new(),
            currency: Currency::Usd,
            total_price: 100.0,
            payment_method: PaymentMethod::Card,
            delivery_method: DeliveryMethod::Pickup,
            delivery_address: "1 Main St".to_string(),
            delivery_date: Utc::now() + Duration::days(3),
            items: vec![OrderLine {
                product_id: ProductId::new(),
                quantity: 2,
            }],
            coupon: None,
        }
    }

    fn dedup() -> DedupKey {
        DedupKey::new("order-service", Uuid::new_v4())
    }

    #[tokio::test]
    async fn create_order_appends_both_intents() {
        let (service, repo) = service();

        let order = service.create_order(request()).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);

        let rows = repo.outbox().rows();
        let types: Vec<&str> = rows.iter().map(|r| r.event_type.as_str()).collect();
        assert_eq!(types, vec!["order-created", "quantity-requested"]);
        assert!(rows.iter().all(|r| r.is_unprocessed()));

        // Both rows carry the same wire body.
        assert_eq!(rows[0].payload, rows[1].payload);
        assert_eq!(
            rows[0].payload["orderId"],
            serde_json::to_value(order.id).unwrap()
        );
    }

    #[tokio::test]
    async fn coupon_discounts_the_price() {
        let (service, repo) = service();
        repo.seed_coupon(Coupon {
            code: "SAVE10".to_string(),
            discount: 10.0,
            valid_to: Utc::now() + Duration::days(30),
            active: true,
        });

        let mut req = request();
        req.coupon = Some("SAVE10".to_string());
        let order = service.create_order(req).await.unwrap();

        assert!((order.total_price - 90.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn missing_coupon_rejects_without_side_effects() {
        let (service, repo) = service();

        let mut req = request();
        req.coupon = Some("NOPE".to_string());
        let err = service.create_order(req).await.unwrap_err();

        assert!(matches!(err, OrderError::CouponNotFound(_)));
        assert!(service.list_orders(None).await.unwrap().is_empty());
        assert_eq!(repo.outbox().rows().len(), 0);
    }

    #[tokio::test]
    async fn expired_coupon_rejects_without_side_effects() {
        let (service, repo) = service();
        repo.seed_coupon(Coupon {
            code: "OLD".to_string(),
            discount: 10.0,
            valid_to: "2000-01-01T00:00:00Z".parse().unwrap(),
            active: true,
        });

        let mut req = request();
        req.coupon = Some("OLD".to_string());
        let err = service.create_order(req).await.unwrap_err();

        assert!(matches!(err, OrderError::CouponExpired(_)));
        assert!(service.list_orders(None).await.unwrap().is_empty());
        assert_eq!(repo.outbox().rows().len(), 0);
    }

    #[tokio::test]
    async fn inactive_coupon_is_rejected() {
        let (service, repo) = service();
        repo.seed_coupon(Coupon {
            code: "OFF".to_string(),
            discount: 10.0,
            valid_to: Utc::now() + Duration::days(30),
            active: false,
        });

        let mut req = request();
        req.coupon = Some("OFF".to_string());
        let err = service.create_order(req).await.unwrap_err();
        assert!(matches!(err, OrderError::CouponNotActive(_)));
    }

    #[tokio::test]
    async fn paid_then_completed_lifecycle() {
        let (service, _) = service();
        let order = service.create_order(request()).await.unwrap();

        service
            .mark_paid_from_event(order.id, dedup())
            .await
            .unwrap();
        let completed = service.complete_order(order.id).await.unwrap();
        assert_eq!(completed.status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn complete_requires_paid() {
        let (service, _) = service();
        let order = service.create_order(request()).await.unwrap();

        let err = service.complete_order(order.id).await.unwrap_err();
        assert!(matches!(err, OrderError::InvalidStatus { .. }));
    }

    #[tokio::test]
    async fn cancel_from_pending_releases_the_reservation() {
        let (service, repo) = service();
        let order = service.create_order(request()).await.unwrap();

        let cancelled = service.cancel_order(order.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        let types: Vec<String> = repo
            .outbox()
            .rows()
            .iter()
            .map(|r| r.event_type.clone())
            .collect();
        assert!(types.contains(&"order-cancelled".to_string()));
        assert!(types.contains(&"quantity-released".to_string()));
    }

    #[tokio::test]
    async fn cancel_from_paid_does_not_touch_inventory() {
        let (service, repo) = service();
        let order = service.create_order(request()).await.unwrap();
        service
            .mark_paid_from_event(order.id, dedup())
            .await
            .unwrap();

        service.cancel_order(order.id).await.unwrap();

        let types: Vec<String> = repo
            .outbox()
            .rows()
            .iter()
            .map(|r| r.event_type.clone())
            .collect();
        assert!(types.contains(&"quantity-subtracted".to_string()));
        assert!(!types.contains(&"quantity-released".to_string()));
    }

    #[tokio::test]
    async fn cancel_after_cancel_is_already_cancelled() {
        let (service, _) = service();
        let order = service.create_order(request()).await.unwrap();
        service.cancel_order(order.id).await.unwrap();

        let err = service.cancel_order(order.id).await.unwrap_err();
        assert!(matches!(err, OrderError::AlreadyCancelled(_)));
    }

    #[tokio::test]
    async fn complete_after_complete_is_already_completed() {
        let (service, _) = service();
        let order = service.create_order(request()).await.unwrap();
        service
            .mark_paid_from_event(order.id, dedup())
            .await
            .unwrap();
        service.complete_order(order.id).await.unwrap();

        let err = service.complete_order(order.id).await.unwrap_err();
        assert!(matches!(err, OrderError::AlreadyCompleted(_)));
    }

    #[tokio::test]
    async fn duplicate_payment_event_applies_once() {
        let (service, repo) = service();
        let order = service.create_order(request()).await.unwrap();

        let key = dedup();
        let first = service
            .mark_paid_from_event(order.id, key.clone())
            .await
            .unwrap();
        let second = service.mark_paid_from_event(order.id, key).await.unwrap();

        assert!(matches!(first, TransitionOutcome::Applied(_)));
        assert!(matches!(second, TransitionOutcome::Duplicate));

        // Exactly one quantity-subtracted row was appended.
        let subtracted = repo
            .outbox()
            .rows()
            .iter()
            .filter(|r| r.event_type == "quantity-subtracted")
            .count();
        assert_eq!(subtracted, 1);
    }

    #[tokio::test]
    async fn update_and_delete() {
        let (service, _) = service();
        let order = service.create_order(request()).await.unwrap();

        let updated = service
            .update_order(
                order.id,
                DeliveryUpdate {
                    delivery_address: Some("2 Side St".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.delivery_address, "2 Side St");

        service.delete_order(order.id).await.unwrap();
        let err = service.get_order(order.id).await.unwrap_err();
        assert!(matches!(err, OrderError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_filters_by_user() {
        let (service, _) = service();
        let order = service.create_order(request()).await.unwrap();
        service.create_order(request()).await.unwrap();

        let mine = service.list_orders(Some(order.user_id)).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, order.id);

        let all = service.list_orders(None).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
