//! Consumer loop: dispatches broker messages to service handlers.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::broker::{Consumer, Delivery};
use crate::event::EventType;
use crate::shutdown::Shutdown;

/// Initial reconnect delay after a broker session loss.
pub const RECONNECT_BASE: Duration = Duration::from_secs(1);

/// Upper bound on the reconnect delay.
pub const RECONNECT_CAP: Duration = Duration::from_secs(30);

/// Returns the next delay in the 1s ×1.5 capped-at-30s reconnect schedule.
pub fn next_backoff(current: Duration) -> Duration {
    current.mul_f64(1.5).min(RECONNECT_CAP)
}

/// Classification of a handler failure, deciding the acknowledgement.
///
/// Permanent failures (validation, unknown operation) are logged and the
/// message acknowledged so it cannot poison the loop. Transient failures
/// (storage, broker) leave the message unacknowledged for redelivery.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("permanent failure: {0}")]
    Permanent(Box<dyn std::error::Error + Send + Sync>),
    #[error("transient failure: {0}")]
    Transient(Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    pub fn permanent<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Permanent(err.into())
    }

    pub fn transient<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Transient(err.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, HandlerError::Transient(_))
    }
}

/// A service's dispatch table for consumed events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Processes one message. `message_id` is the broker key (the outbox
    /// row id) and is used for deduplication.
    async fn handle(
        &self,
        event_type: EventType,
        message_id: Uuid,
        payload: &serde_json::Value,
    ) -> Result<(), HandlerError>;
}

/// Long-lived task consuming one group and dispatching to a handler.
pub struct ConsumerLoop<C, H> {
    name: &'static str,
    consumer: C,
    handler: H,
    shutdown: Shutdown,
}

impl<C, H> ConsumerLoop<C, H>
where
    C: Consumer,
    H: EventHandler,
{
    pub fn new(name: &'static str, consumer: C, handler: H, shutdown: Shutdown) -> Self {
        Self {
            name,
            consumer,
            handler,
            shutdown,
        }
    }

    /// Runs until shutdown or until the broker closes the group.
    pub async fn run(mut self) {
        let mut backoff = RECONNECT_BASE;
        loop {
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                received = self.consumer.recv() => match received {
                    Ok(Some(delivery)) => {
                        backoff = RECONNECT_BASE;
                        self.process(delivery).await;
                    }
                    Ok(None) => {
                        tracing::info!(consumer = self.name, "consumer group closed");
                        break;
                    }
                    Err(err) => {
                        tracing::warn!(
                            consumer = self.name,
                            error = %err,
                            delay_ms = backoff.as_millis() as u64,
                            "broker session lost, reconnecting"
                        );
                        tokio::time::sleep(backoff).await;
                        backoff = next_backoff(backoff);
                    }
                }
            }
        }
        tracing::info!(consumer = self.name, "consumer loop stopped");
    }

    async fn process(&self, delivery: Delivery) {
        let Some(raw) = delivery.message.event_type.as_deref() else {
            tracing::warn!(
                consumer = self.name,
                key = %delivery.message.key,
                "message missing event_type header, skipping"
            );
            self.acknowledge(&delivery).await;
            return;
        };

        let event_type = match raw.parse::<EventType>() {
            Ok(event_type) => event_type,
            Err(err) => {
                tracing::warn!(consumer = self.name, error = %err, "skipping message");
                self.acknowledge(&delivery).await;
                return;
            }
        };

        match self
            .handler
            .handle(event_type, delivery.message.key, &delivery.message.payload)
            .await
        {
            Ok(()) => {
                metrics::counter!("events_consumed_total", "consumer" => self.name).increment(1);
                self.acknowledge(&delivery).await;
            }
            Err(err @ HandlerError::Permanent(_)) => {
                tracing::error!(
                    consumer = self.name,
                    event_type = %event_type,
                    key = %delivery.message.key,
                    error = %err,
                    "permanent failure, acknowledging to avoid a poison loop"
                );
                metrics::counter!("events_rejected_total", "consumer" => self.name).increment(1);
                self.acknowledge(&delivery).await;
            }
            Err(err @ HandlerError::Transient(_)) => {
                tracing::warn!(
                    consumer = self.name,
                    event_type = %event_type,
                    key = %delivery.message.key,
                    error = %err,
                    "transient failure, leaving message for redelivery"
                );
                if let Err(nack_err) = self.consumer.nack(&delivery).await {
                    tracing::warn!(consumer = self.name, error = %nack_err, "nack failed");
                }
            }
        }
    }

    async fn acknowledge(&self, delivery: &Delivery) {
        if let Err(err) = self.consumer.ack(delivery).await {
            tracing::warn!(consumer = self.name, error = %err, "ack failed");
        }
    }
}
