//! Shared types for the commerce services.
//!
//! This crate provides the identifier newtypes and enumerations used across
//! the inventory, order, and payment services, plus the critical-error
//! reporting helper.

pub mod report;
pub mod types;

pub use report::{Critical, report_failure};
pub use types::{
    Currency, DeliveryMethod, OrderId, PaymentId, PaymentMethod, ProductId, UnknownVariant, UserId,
};
