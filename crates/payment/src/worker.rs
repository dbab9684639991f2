//! Billing driver: charges pending payments and writes outcome events.
//!
//! The relay stays a pure publisher; this worker owns the billing
//! collaborator. Each tick it drains pending payments, charges them under a
//! timeout, and in one transaction settles the payment row and appends the
//! outcome outbox row: `payment-completed` on success, `payment-failed`
//! otherwise. Explicit cancellations emit `payment-cancelled` elsewhere.

use std::time::Duration;

use common::report_failure;
use messaging::{EventType, OutboxRecord};

use crate::billing::{BillingError, BillingProvider};
use crate::error::{PaymentError, Result};
use crate::model::Payment;
use crate::repository::{PaymentRepository, PaymentTransition};
use crate::status::PaymentStatus;

/// Billing driver tuning knobs.
#[derive(Debug, Clone)]
pub struct BillingWorkerConfig {
    /// Time between drain ticks.
    pub tick: Duration,
    /// Maximum payments charged per tick.
    pub batch_size: i64,
    /// Bound on a single billing call.
    pub charge_timeout: Duration,
}

impl Default for BillingWorkerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            batch_size: 10,
            charge_timeout: Duration::from_secs(60),
        }
    }
}

/// Periodic worker charging pending payments.
pub struct BillingWorker<R, B> {
    repo: R,
    biller: B,
    config: BillingWorkerConfig,
    shutdown: messaging::Shutdown,
}

impl<R, B> BillingWorker<R, B>
where
    R: PaymentRepository,
    B: BillingProvider,
{
    pub fn new(
        repo: R,
        biller: B,
        config: BillingWorkerConfig,
        shutdown: messaging::Shutdown,
    ) -> Self {
        Self {
            repo,
            biller,
            config,
            shutdown,
        }
    }

    /// Runs the tick loop until shutdown.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.config.tick);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.drain_once().await {
                        report_failure("billing driver", &err);
                    }
                }
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("billing driver stopped");
    }

    /// Charges one batch of pending payments; returns how many settled.
    pub async fn drain_once(&self) -> Result<usize> {
        let pending = self.repo.list_pending(self.config.batch_size).await?;
        let mut settled = 0;
        for payment in pending {
            self.charge(&payment).await?;
            settled += 1;
        }
        Ok(settled)
    }

    async fn charge(&self, payment: &Payment) -> Result<()> {
        let charged = tokio::time::timeout(
            self.config.charge_timeout,
            self.biller
                .new_payment(payment.currency, payment.total_price, &payment.description),
        )
        .await
        .unwrap_or(Err(BillingError::Timeout));

        let (target, event_type, redirect_url) = match charged {
            Ok(receipt) => (
                PaymentStatus::Completed,
                EventType::PaymentCompleted,
                Some(receipt.redirect_url),
            ),
            Err(err) => {
                report_failure("billing charge", &PaymentError::Billing(err));
                (PaymentStatus::Failed, EventType::PaymentFailed, None)
            }
        };

        // Outcome messages carry the order id as their payload; the key is
        // the outbox row id assigned here.
        let record = OutboxRecord::for_event(event_type, &payment.order_id)?;

        match self
            .repo
            .transition(payment.id, target, redirect_url.as_deref(), &[record], None)
            .await
        {
            Ok(PaymentTransition::Applied(updated)) => {
                metrics::counter!("billing_outcomes_total", "outcome" => target.as_str())
                    .increment(1);
                tracing::info!(
                    payment_id = %updated.id,
                    order_id = %updated.order_id,
                    status = %updated.status,
                    "payment settled"
                );
                Ok(())
            }
            Ok(PaymentTransition::Duplicate) => Ok(()),
            // The payment left pending while billing ran (user cancelled);
            // drop the outcome.
            Err(PaymentError::InvalidPayment { id, status }) => {
                tracing::debug!(payment_id = %id, %status, "payment settled elsewhere, skipping");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}
