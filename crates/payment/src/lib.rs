//! Payment service: payment attempts driven by order events and an external
//! billing collaborator, with retry and cancellation.

pub mod billing;
pub mod error;
pub mod handler;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod repository;
pub mod service;
pub mod status;
pub mod worker;

pub use billing::{BillingError, BillingProvider, BillingReceipt, InMemoryBillingProvider};
pub use error::PaymentError;
pub use handler::{CONSUMER_GROUP, PaymentEventHandler};
pub use memory::InMemoryPaymentRepository;
pub use model::{NewPayment, Payment};
pub use postgres::PostgresPaymentRepository;
pub use repository::{CreateOutcome, PaymentRepository, PaymentTransition};
pub use service::PaymentService;
pub use status::PaymentStatus;
pub use worker::{BillingWorker, BillingWorkerConfig};
