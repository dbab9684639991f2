//! Broker seam and the in-process implementation.
//!
//! The services publish through [`Producer`] and consume through
//! [`Consumer`]. The single implementation is [`InMemoryBroker`], a
//! consumer-group queue with acknowledge/redeliver semantics: a message is
//! fanned out to every subscribed group, removed from a group's queue on
//! `recv`, and parked in-flight until `ack`; `nack` returns it to the front
//! of the queue for redelivery. Delivery is at-least-once; consumers are
//! expected to deduplicate by message key.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::error::MessagingError;

/// A broker message: topic, key, `event_type` header, and JSON payload.
#[derive(Debug, Clone)]
pub struct Message {
    pub topic: String,
    /// Message key; the outbox row id for relayed events.
    pub key: Uuid,
    /// The `event_type` header. Messages without it are skipped by consumers.
    pub event_type: Option<String>,
    pub payload: serde_json::Value,
}

impl Message {
    pub fn new(
        topic: impl Into<String>,
        key: Uuid,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            topic: topic.into(),
            key,
            event_type: Some(event_type.into()),
            payload,
        }
    }
}

/// A message handed to a consumer, carrying the tag used to acknowledge it.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message: Message,
    pub tag: u64,
}

/// Publishes messages to the broker.
#[async_trait]
pub trait Producer: Send + Sync {
    async fn send(&self, message: Message) -> Result<(), MessagingError>;
}

/// Receives messages for one consumer group.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Waits for the next delivery. `Ok(None)` means the broker was closed
    /// and the group drained; the consumer loop terminates cleanly.
    async fn recv(&self) -> Result<Option<Delivery>, MessagingError>;

    /// Acknowledges a delivery; the message will not be redelivered.
    async fn ack(&self, delivery: &Delivery) -> Result<(), MessagingError>;

    /// Returns a delivery to the queue for redelivery.
    async fn nack(&self, delivery: &Delivery) -> Result<(), MessagingError>;
}

#[derive(Debug, Default)]
struct GroupState {
    topics: Vec<String>,
    queue: VecDeque<(u64, Message)>,
    in_flight: HashMap<u64, Message>,
}

#[derive(Debug, Default)]
struct BrokerInner {
    groups: HashMap<String, GroupState>,
    next_tag: u64,
    closed: bool,
}

/// In-process broker shared by the three services.
///
/// Publishes are serialized by the internal lock, so concurrent producers
/// cannot interleave partial writes.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    inner: Arc<Mutex<BrokerInner>>,
    notify: Arc<Notify>,
}

impl InMemoryBroker {
    /// Creates a new empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a consumer group for the given topics and returns its
    /// consumer handle. Subscribing the same group twice extends its topics.
    pub fn subscribe(&self, group: &str, topics: &[&str]) -> InMemoryConsumer {
        let mut inner = self.inner.lock().unwrap();
        let state = inner.groups.entry(group.to_string()).or_default();
        for topic in topics {
            if !state.topics.iter().any(|t| t == topic) {
                state.topics.push((*topic).to_string());
            }
        }
        InMemoryConsumer {
            inner: Arc::clone(&self.inner),
            notify: Arc::clone(&self.notify),
            group: group.to_string(),
        }
    }

    /// Closes the broker: publishes fail and consumers terminate after
    /// draining their queues.
    pub fn close(&self) {
        self.inner.lock().unwrap().closed = true;
        self.notify.notify_waiters();
    }

    /// Number of messages queued for a group (test observability).
    pub fn queued(&self, group: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .groups
            .get(group)
            .map(|g| g.queue.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Producer for InMemoryBroker {
    async fn send(&self, message: Message) -> Result<(), MessagingError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Err(MessagingError::Closed);
        }
        inner.next_tag += 1;
        let tag = inner.next_tag;
        for state in inner.groups.values_mut() {
            if state.topics.iter().any(|t| *t == message.topic) {
                state.queue.push_back((tag, message.clone()));
            }
        }
        drop(inner);
        self.notify.notify_waiters();
        Ok(())
    }
}

/// Consumer handle for one group of an [`InMemoryBroker`].
#[derive(Clone)]
pub struct InMemoryConsumer {
    inner: Arc<Mutex<BrokerInner>>,
    notify: Arc<Notify>,
    group: String,
}

#[async_trait]
impl Consumer for InMemoryConsumer {
    async fn recv(&self) -> Result<Option<Delivery>, MessagingError> {
        loop {
            // Register for wakeups before checking the queue, so a publish
            // landing in between is not lost.
            let mut notified = std::pin::pin!(self.notify.notified());
            notified.as_mut().enable();
            {
                let mut inner = self.inner.lock().unwrap();
                let closed = inner.closed;
                if let Some(state) = inner.groups.get_mut(&self.group) {
                    if let Some((tag, message)) = state.queue.pop_front() {
                        state.in_flight.insert(tag, message.clone());
                        return Ok(Some(Delivery { message, tag }));
                    }
                }
                if closed {
                    return Ok(None);
                }
            }
            notified.await;
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), MessagingError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(state) = inner.groups.get_mut(&self.group) {
            state.in_flight.remove(&delivery.tag);
        }
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery) -> Result<(), MessagingError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(state) = inner.groups.get_mut(&self.group) {
            if let Some(message) = state.in_flight.remove(&delivery.tag) {
                state.queue.push_front((delivery.tag, message));
            }
        }
        drop(inner);
        self.notify.notify_waiters();
        Ok(())
    }
}
