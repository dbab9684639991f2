//! Outbox relay: publishes unprocessed rows to the broker.

use std::time::Duration;

use crate::broker::{Message, Producer};
use crate::error::Result;
use crate::outbox::OutboxStore;
use crate::shutdown::Shutdown;

/// Relay tuning knobs.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Time between drain ticks.
    pub tick: Duration,
    /// Maximum rows drained per tick.
    pub batch_size: i64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            batch_size: 10,
        }
    }
}

/// Periodic worker draining one service's outbox to the broker.
///
/// Each tick reads the oldest unprocessed rows and publishes them
/// sequentially, so a single writer's events keep their append order. A row
/// is marked processed only after the broker acknowledged it; a publish
/// failure stops the batch and the row is retried on the next tick, which
/// can duplicate deliveries. Consumers deduplicate by message key.
pub struct OutboxRelay<S, P> {
    store: S,
    producer: P,
    config: RelayConfig,
    shutdown: Shutdown,
}

impl<S, P> OutboxRelay<S, P>
where
    S: OutboxStore,
    P: Producer,
{
    pub fn new(store: S, producer: P, config: RelayConfig, shutdown: Shutdown) -> Self {
        Self {
            store,
            producer,
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
                        common::report_failure("outbox relay", &err);
                    }
                }
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("outbox relay stopped");
    }

    /// Drains one batch; returns the number of rows published.
    pub async fn drain_once(&self) -> Result<usize> {
        let rows = self.store.fetch_unprocessed(self.config.batch_size).await?;
        let mut published = 0;
        for row in rows {
            let message = Message::new(
                row.topic.clone(),
                row.id,
                row.event_type.clone(),
                row.payload.clone(),
            );
            match self.producer.send(message).await {
                Ok(()) => {
                    self.store.mark_processed(row.id).await?;
                    published += 1;
                    metrics::counter!("outbox_published_total").increment(1);
                }
                Err(err) => {
                    // Stop the batch; this row and the rest retry next tick.
                    tracing::warn!(
                        outbox_id = %row.id,
                        event_type = %row.event_type,
                        error = %err,
                        "publish failed, stopping batch"
                    );
                    metrics::counter!("outbox_publish_errors_total").increment(1);
                    break;
                }
            }
        }
        Ok(published)
    }
}
