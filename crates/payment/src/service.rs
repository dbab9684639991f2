//! High-level payment operations backing the RPC surface and the consumer.

use chrono::Utc;
use common::{OrderId, PaymentId, UserId};
use messaging::{DedupKey, EventType, OrderEvent, OutboxRecord};

use crate::error::{PaymentError, Result};
use crate::model::{NewPayment, Payment};
use crate::repository::{CreateOutcome, PaymentRepository, PaymentTransition};
use crate::status::PaymentStatus;

/// Service for managing payments.
pub struct PaymentService<R> {
    repo: R,
}

impl<R: PaymentRepository> PaymentService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a pending payment (RPC surface).
    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn create_payment(&self, request: NewPayment) -> Result<Payment> {
        let payment = Payment::create(&request, Utc::now())?;
        self.repo.create(&payment, None).await?;
        metrics::counter!("payments_created_total").increment(1);
        tracing::info!(payment_id = %payment.id, "payment created");
        Ok(payment)
    }

    /// Consumer entry point for `order-created`: persists a pending payment
    /// for the order.
    #[tracing::instrument(skip(self, event, dedup), fields(order_id = %event.order_id))]
    pub async fn create_from_event(
        &self,
        event: &OrderEvent,
        dedup: DedupKey,
    ) -> Result<CreateOutcome> {
        let payment = Payment::from_order_event(event, Utc::now())?;
        let outcome = self.repo.create(&payment, Some(dedup)).await?;
        if outcome == CreateOutcome::Created {
            metrics::counter!("payments_created_total").increment(1);
        }
        Ok(outcome)
    }

    /// Consumer entry point for `order-cancelled`: cancels the order's
    /// pending payment. Non-pending payments fail `InvalidPayment`.
    #[tracing::instrument(skip(self, dedup))]
    pub async fn cancel_from_event(
        &self,
        order_id: OrderId,
        dedup: DedupKey,
    ) -> Result<PaymentTransition> {
        let payment = self.repo.get_by_order(order_id).await?.ok_or_else(|| {
            PaymentError::InvalidArgument(format!("no payment for order {order_id}"))
        })?;

        let records = vec![OutboxRecord::for_event(
            EventType::PaymentCancelled,
            &order_id,
        )?];
        self.repo
            .transition(
                payment.id,
                PaymentStatus::Cancelled,
                None,
                &records,
                Some(dedup),
            )
            .await
    }

    /// Returns the payment status for its owner.
    #[tracing::instrument(skip(self))]
    pub async fn get_status(&self, id: PaymentId, user_id: UserId) -> Result<PaymentStatus> {
        Ok(self.owned(id, user_id).await?.status)
    }

    /// `cancelled|failed → pending`; the billing driver will charge again.
    #[tracing::instrument(skip(self))]
    pub async fn retry_payment(&self, id: PaymentId, user_id: UserId) -> Result<Payment> {
        self.owned(id, user_id).await?;
        let outcome = self
            .repo
            .transition(id, PaymentStatus::Pending, None, &[], None)
            .await?;
        metrics::counter!("payments_retried_total").increment(1);
        Ok(applied(outcome))
    }

    /// `pending → completed`, emitting `payment-completed`.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_payment(&self, id: PaymentId, user_id: UserId) -> Result<Payment> {
        let payment = self.owned(id, user_id).await?;
        let records = vec![OutboxRecord::for_event(
            EventType::PaymentCompleted,
            &payment.order_id,
        )?];
        let outcome = self
            .repo
            .transition(id, PaymentStatus::Completed, None, &records, None)
            .await?;
        Ok(applied(outcome))
    }

    /// `pending → cancelled`, emitting `payment-cancelled`.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_payment(&self, id: PaymentId, user_id: UserId) -> Result<Payment> {
        let payment = self.owned(id, user_id).await?;
        let records = vec![OutboxRecord::for_event(
            EventType::PaymentCancelled,
            &payment.order_id,
        )?];
        let outcome = self
            .repo
            .transition(id, PaymentStatus::Cancelled, None, &records, None)
            .await?;
        Ok(applied(outcome))
    }

    /// Loads a payment, hiding other users' payments behind `NotFound`.
    async fn owned(&self, id: PaymentId, user_id: UserId) -> Result<Payment> {
        let payment = self
            .repo
            .get(id)
            .await?
            .ok_or(PaymentError::NotFound(id))?;
        if payment.user_id != user_id {
            return Err(PaymentError::NotFound(id));
        }
        Ok(payment)
    }
}

fn applied(outcome: PaymentTransition) -> Payment {
    match outcome {
        PaymentTransition::Applied(payment) => payment,
        // Transitions without a dedup key always apply.
        PaymentTransition::Duplicate => unreachable!("transition without dedup reported duplicate"),
    }
}
