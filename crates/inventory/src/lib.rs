//! Inventory service: per-product `(available, reserved)` counts driven by
//! an idempotent command set and quantity-intent events.

pub mod error;
pub mod handler;
pub mod item;
pub mod memory;
pub mod op;
pub mod postgres;
pub mod repository;
pub mod service;

pub use error::InventoryError;
pub use handler::{CONSUMER_GROUP, InventoryEventHandler};
pub use item::InventoryItem;
pub use memory::InMemoryInventoryRepository;
pub use op::Operation;
pub use postgres::PostgresInventoryRepository;
pub use repository::{BatchOutcome, InventoryRepository, QuantityLine};
pub use service::InventoryService;
