//! Event plumbing shared by the commerce services.
//!
//! This crate provides:
//! - the broker seam ([`Producer`]/[`Consumer`]) and the in-process broker
//!   with consumer-group semantics used by the binary and the tests
//! - the transactional outbox ([`OutboxRecord`], [`OutboxStore`]) and the
//!   relay worker that publishes unprocessed rows
//! - the consumer loop runner with reconnect backoff and the
//!   permanent/transient acknowledgement policy
//! - the event-type registry and the `OrderEvent` wire body

pub mod broker;
pub mod consumer;
pub mod dedup;
pub mod error;
pub mod event;
pub mod outbox;
pub mod relay;
pub mod shutdown;

pub use broker::{Consumer, Delivery, InMemoryBroker, InMemoryConsumer, Message, Producer};
pub use consumer::{ConsumerLoop, EventHandler, HandlerError};
pub use dedup::DedupKey;
pub use error::MessagingError;
pub use event::{
    EventType, INVENTORY_TOPIC, ORDER_TOPIC, OrderEvent, OrderEventItem, PAYMENT_TOPIC,
};
pub use outbox::{InMemoryOutboxStore, OutboxRecord, OutboxStore, PostgresOutboxStore};
pub use relay::{OutboxRelay, RelayConfig};
pub use shutdown::{Shutdown, ShutdownSignal};
