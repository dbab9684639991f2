//! Payment entity and creation input.

use chrono::{DateTime, Utc};
use common::{Currency, OrderId, PaymentId, PaymentMethod, UserId};
use messaging::OrderEvent;
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};
use crate::status::PaymentStatus;

/// Longest stored payment description.
pub const MAX_DESCRIPTION_LEN: usize = 255;

/// A payment attempt for one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub user_id: UserId,
    pub order_id: OrderId,
    pub currency: Currency,
    pub total_price: f64,
    pub status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub description: String,
    /// Where the payer completes the flow; empty until billing settles.
    pub redirect_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input to `CreatePayment`.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub currency: Currency,
    pub total_price: f64,
    pub payment_method: PaymentMethod,
    pub description: String,
}

impl Payment {
    /// Constructs a pending payment from validated input.
    pub fn create(request: &NewPayment, now: DateTime<Utc>) -> Result<Self> {
        if !request.total_price.is_finite() || request.total_price <= 0.0 {
            return Err(PaymentError::InvalidArgument(format!(
                "total price must be positive, got {}",
                request.total_price
            )));
        }
        if !request.payment_method.billable() {
            return Err(PaymentError::InvalidArgument(format!(
                "payment method {} cannot be billed",
                request.payment_method
            )));
        }

        Ok(Self {
            id: PaymentId::new(),
            user_id: request.user_id,
            order_id: request.order_id,
            currency: request.currency,
            total_price: request.total_price,
            status: PaymentStatus::Pending,
            payment_method: request.payment_method,
            description: truncate_description(&request.description),
            redirect_url: String::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Constructs a pending payment from a consumed `order-created` event.
    ///
    /// Order payment methods outside the billing rails (paypal, crypto)
    /// settle through the card rail.
    pub fn from_order_event(event: &OrderEvent, now: DateTime<Utc>) -> Result<Self> {
        let payment_method = if event.payment_method.billable() {
            event.payment_method
        } else {
            PaymentMethod::Card
        };

        Self::create(
            &NewPayment {
                order_id: event.order_id,
                user_id: event.user_id,
                currency: event.currency,
                total_price: event.total_price,
                payment_method,
                description: event.description.clone(),
            },
            now,
        )
    }
}

fn truncate_description(description: &str) -> String {
    description.chars().take(MAX_DESCRIPTION_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use messaging::OrderEventItem;

    fn request() -> NewPayment {
        NewPayment {
            order_id: OrderId::new(),
            user_id: UserId::new(),
            currency: Currency::Usd,
            total_price: 100.0,
            payment_method: PaymentMethod::Card,
            description: "Order".to_string(),
        }
    }

    #[test]
    fn create_builds_a_pending_payment() {
        let payment = Payment::create(&request(), Utc::now()).unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert!(payment.redirect_url.is_empty());
        assert_eq!(payment.created_at, payment.updated_at);
    }

    #[test]
    fn create_rejects_non_positive_price() {
        let mut req = request();
        req.total_price = 0.0;
        assert!(matches!(
            Payment::create(&req, Utc::now()),
            Err(PaymentError::InvalidArgument(_))
        ));
        req.total_price = -5.0;
        assert!(Payment::create(&req, Utc::now()).is_err());
    }

    #[test]
    fn create_rejects_non_billable_method() {
        let mut req = request();
        req.payment_method = PaymentMethod::Paypal;
        assert!(matches!(
            Payment::create(&req, Utc::now()),
            Err(PaymentError::InvalidArgument(_))
        ));
    }

    #[test]
    fn long_descriptions_are_truncated() {
        let mut req = request();
        req.description = "x".repeat(1000);
        let payment = Payment::create(&req, Utc::now()).unwrap();
        assert_eq!(payment.description.chars().count(), MAX_DESCRIPTION_LEN);
    }

    #[test]
    fn from_order_event_maps_non_billable_methods_to_card() {
        let event = OrderEvent {
            order_id: OrderId::new(),
            user_id: UserId::new(),
            currency: Currency::Eur,
            total_price: 50.0,
            payment_method: PaymentMethod::Crypto,
            description: "Order".to_string(),
            items: vec![OrderEventItem {
                product_id: common::ProductId::new(),
                quantity: 1,
            }],
        };

        let payment = Payment::from_order_event(&event, Utc::now()).unwrap();
        assert_eq!(payment.payment_method, PaymentMethod::Card);
        assert_eq!(payment.order_id, event.order_id);
        assert_eq!(payment.currency, Currency::Eur);
    }
}
