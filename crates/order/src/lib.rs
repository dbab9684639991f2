//! Order service: owns orders and their lifecycle, emits order and quantity
//! intents through its outbox, and consumes payment outcomes.

pub mod coupon;
pub mod error;
pub mod handler;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod repository;
pub mod service;
pub mod status;

pub use coupon::Coupon;
pub use error::OrderError;
pub use handler::{CONSUMER_GROUP, OrderEventHandler};
pub use memory::InMemoryOrderRepository;
pub use model::{DeliveryUpdate, NewOrder, Order, OrderLine};
pub use postgres::PostgresOrderRepository;
pub use repository::{OrderRepository, TransitionOutcome};
pub use service::OrderService;
pub use status::OrderStatus;
