//! Order entity and creation/update inputs.

use chrono::{DateTime, Utc};
use common::{Currency, DeliveryMethod, OrderId, PaymentMethod, ProductId, UserId};
use messaging::{OrderEvent, OrderEventItem};
use serde::{Deserialize, Serialize};

use crate::error::{OrderError, Result};
use crate::status::OrderStatus;

/// One `(product, quantity)` line of an order. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u64,
}

/// An order aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub currency: Currency,
    /// Discounted total, in currency units.
    pub total_price: f64,
    pub payment_method: PaymentMethod,
    pub delivery_method: DeliveryMethod,
    pub delivery_address: String,
    pub delivery_date: DateTime<Utc>,
    pub items: Vec<OrderLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input to `CreateOrder`.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub currency: Currency,
    /// Base price before any coupon discount.
    pub total_price: f64,
    pub payment_method: PaymentMethod,
    pub delivery_method: DeliveryMethod,
    pub delivery_address: String,
    pub delivery_date: DateTime<Utc>,
    pub items: Vec<OrderLine>,
    pub coupon: Option<String>,
}

/// Mutable delivery fields of a pending order.
#[derive(Debug, Clone, Default)]
pub struct DeliveryUpdate {
    pub delivery_address: Option<String>,
    pub delivery_method: Option<DeliveryMethod>,
    pub delivery_date: Option<DateTime<Utc>>,
}

impl Order {
    /// Constructs a pending order from validated input and the final
    /// (discounted) price.
    pub fn create(request: &NewOrder, total_price: f64, now: DateTime<Utc>) -> Result<Self> {
        validate_price(request.total_price)?;
        validate_price(total_price)?;
        validate_address(&request.delivery_address)?;
        validate_delivery_date(request.delivery_date, now)?;
        validate_items(&request.items)?;

        Ok(Self {
            id: OrderId::new(),
            user_id: request.user_id,
            status: OrderStatus::Pending,
            currency: request.currency,
            total_price,
            payment_method: request.payment_method,
            delivery_method: request.delivery_method,
            delivery_address: request.delivery_address.clone(),
            delivery_date: request.delivery_date,
            items: request.items.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Applies a delivery update. Items and price are immutable; only
    /// pending orders may change.
    pub fn apply_delivery_update(&mut self, update: DeliveryUpdate, now: DateTime<Utc>) -> Result<()> {
        if self.status != OrderStatus::Pending {
            return Err(OrderError::InvalidStatus {
                status: self.status,
                action: "update",
            });
        }
        if let Some(address) = update.delivery_address {
            validate_address(&address)?;
            self.delivery_address = address;
        }
        if let Some(method) = update.delivery_method {
            self.delivery_method = method;
        }
        if let Some(date) = update.delivery_date {
            validate_delivery_date(date, now)?;
            self.delivery_date = date;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Builds the wire body shared by order and quantity intents.
    pub fn to_event(&self) -> OrderEvent {
        OrderEvent {
            order_id: self.id,
            user_id: self.user_id,
            currency: self.currency,
            total_price: self.total_price,
            payment_method: self.payment_method,
            description: format!("Order {}", self.id),
            items: self
                .items
                .iter()
                .map(|line| OrderEventItem {
                    product_id: line.product_id,
                    quantity: line.quantity,
                })
                .collect(),
        }
    }
}

fn validate_price(price: f64) -> Result<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(OrderError::InvalidArgument(format!(
            "total price must be a non-negative number, got {price}"
        )));
    }
    Ok(())
}

fn validate_address(address: &str) -> Result<()> {
    if address.trim().is_empty() {
        return Err(OrderError::InvalidArgument(
            "delivery address must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_delivery_date(date: DateTime<Utc>, now: DateTime<Utc>) -> Result<()> {
    if date <= now {
        return Err(OrderError::InvalidArgument(
            "delivery date must be in the future".to_string(),
        ));
    }
    Ok(())
}

fn validate_items(items: &[OrderLine]) -> Result<()> {
    if items.is_empty() {
        return Err(OrderError::InvalidArgument(
            "order must contain at least one item".to_string(),
        ));
    }
    if let Some(line) = items.iter().find(|line| line.quantity == 0) {
        return Err(OrderError::InvalidArgument(format!(
            "item {} has zero quantity",
            line.product_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn request() -> NewOrder {
        NewOrder {
            user_id: UserId::new(),
            currency: Currency::Usd,
            total_price: 100.0,
            payment_method: PaymentMethod::Card,
            delivery_method: DeliveryMethod::Pickup,
            delivery_address: "1 Main St".to_string(),
            delivery_date: Utc::now() + Duration::days(3),
            items: vec![OrderLine {
                product_id: ProductId::new(),
                quantity: 2,
            }],
            coupon: None,
        }
    }

    #[test]
    fn create_builds_a_pending_order() {
        let req = request();
        let order = Order::create(&req, 100.0, Utc::now()).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.user_id, req.user_id);
        assert_eq!(order.total_price, 100.0);
        assert_eq!(order.created_at, order.updated_at);
    }

    #[test]
    fn create_rejects_negative_price() {
        let mut req = request();
        req.total_price = -1.0;
        assert!(matches!(
            Order::create(&req, -1.0, Utc::now()),
            Err(OrderError::InvalidArgument(_))
        ));
    }

    #[test]
    fn create_rejects_empty_address() {
        let mut req = request();
        req.delivery_address = "  ".to_string();
        assert!(Order::create(&req, 100.0, Utc::now()).is_err());
    }

    #[test]
    fn create_rejects_past_delivery_date() {
        let mut req = request();
        req.delivery_date = Utc::now() - Duration::days(1);
        assert!(Order::create(&req, 100.0, Utc::now()).is_err());
    }

    #[test]
    fn create_rejects_empty_items() {
        let mut req = request();
        req.items.clear();
        assert!(Order::create(&req, 100.0, Utc::now()).is_err());
    }

    #[test]
    fn create_rejects_zero_quantity_items() {
        let mut req = request();
        req.items[0].quantity = 0;
        assert!(Order::create(&req, 100.0, Utc::now()).is_err());
    }

    #[test]
    fn delivery_update_requires_pending() {
        let req = request();
        let mut order = Order::create(&req, 100.0, Utc::now()).unwrap();
        order.status = OrderStatus::Paid;

        let result = order.apply_delivery_update(
            DeliveryUpdate {
                delivery_address: Some("2 Side St".to_string()),
                ..Default::default()
            },
            Utc::now(),
        );
        assert!(matches!(result, Err(OrderError::InvalidStatus { .. })));
    }

    #[test]
    fn delivery_update_changes_only_given_fields() {
        let req = request();
        let mut order = Order::create(&req, 100.0, Utc::now()).unwrap();
        let original_date = order.delivery_date;

        order
            .apply_delivery_update(
                DeliveryUpdate {
                    delivery_address: Some("2 Side St".to_string()),
                    delivery_method: Some(DeliveryMethod::Express),
                    delivery_date: None,
                },
                Utc::now(),
            )
            .unwrap();

        assert_eq!(order.delivery_address, "2 Side St");
        assert_eq!(order.delivery_method, DeliveryMethod::Express);
        assert_eq!(order.delivery_date, original_date);
    }

    #[test]
    fn to_event_carries_the_order_body() {
        let req = request();
        let order = Order::create(&req, 90.0, Utc::now()).unwrap();
        let event = order.to_event();

        assert_eq!(event.order_id, order.id);
        assert_eq!(event.total_price, 90.0);
        assert_eq!(event.items.len(), 1);
        assert_eq!(event.items[0].quantity, 2);
        assert!(event.description.contains(&order.id.to_string()));
    }
}
