//! Event-type registry and wire bodies.

use common::{Currency, OrderId, PaymentMethod, ProductId, UnknownVariant, UserId};
use serde::{Deserialize, Serialize};

/// Topic carrying order lifecycle events (consumed by the payment service).
pub const ORDER_TOPIC: &str = "order-events";

/// Topic carrying quantity intents (consumed by the inventory service).
pub const INVENTORY_TOPIC: &str = "inventory-events";

/// Topic carrying payment outcomes (consumed by the order service).
pub const PAYMENT_TOPIC: &str = "payment-events";

/// The recognized values of the `event_type` message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    OrderCreated,
    OrderCancelled,
    OrderCompleted,
    QuantityRequested,
    QuantityReleased,
    QuantitySubtracted,
    PaymentCompleted,
    PaymentCancelled,
    PaymentFailed,
}

impl EventType {
    /// Returns the wire form of the header value.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::OrderCreated => "order-created",
            EventType::OrderCancelled => "order-cancelled",
            EventType::OrderCompleted => "order-completed",
            EventType::QuantityRequested => "quantity-requested",
            EventType::QuantityReleased => "quantity-released",
            EventType::QuantitySubtracted => "quantity-subtracted",
            EventType::PaymentCompleted => "payment-completed",
            EventType::PaymentCancelled => "payment-cancelled",
            EventType::PaymentFailed => "payment-failed",
        }
    }

    /// Returns the topic this event type is published to.
    pub fn topic(&self) -> &'static str {
        match self {
            EventType::OrderCreated | EventType::OrderCancelled | EventType::OrderCompleted => {
                ORDER_TOPIC
            }
            EventType::QuantityRequested
            | EventType::QuantityReleased
            | EventType::QuantitySubtracted => INVENTORY_TOPIC,
            EventType::PaymentCompleted
            | EventType::PaymentCancelled
            | EventType::PaymentFailed => PAYMENT_TOPIC,
        }
    }
}

impl std::str::FromStr for EventType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order-created" => Ok(EventType::OrderCreated),
            "order-cancelled" => Ok(EventType::OrderCancelled),
            "order-completed" => Ok(EventType::OrderCompleted),
            "quantity-requested" => Ok(EventType::QuantityRequested),
            "quantity-released" => Ok(EventType::QuantityReleased),
            "quantity-subtracted" => Ok(EventType::QuantitySubtracted),
            "payment-completed" => Ok(EventType::PaymentCompleted),
            "payment-cancelled" => Ok(EventType::PaymentCancelled),
            "payment-failed" => Ok(EventType::PaymentFailed),
            other => Err(UnknownVariant {
                field: "event_type",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One line of an [`OrderEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEventItem {
    pub product_id: ProductId,
    pub quantity: u64,
}

/// Wire body shared by order intents and quantity intents.
///
/// Serialized with camelCase keys:
/// `{orderId, userId, currency, totalPrice, paymentMethod, description, items}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEvent {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub currency: Currency,
    pub total_price: f64,
    pub payment_method: PaymentMethod,
    pub description: String,
    pub items: Vec<OrderEventItem>,
}
