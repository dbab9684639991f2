//! Coupon resolution and discount application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{OrderError, Result};

/// A discount coupon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    /// Percentage in `[0, 100]`.
    pub discount: f64,
    pub valid_to: DateTime<Utc>,
    pub active: bool,
}

impl Coupon {
    /// Rejects expired and inactive coupons. Expiry is checked first.
    pub fn check(&self, now: DateTime<Utc>) -> Result<()> {
        if self.valid_to < now {
            return Err(OrderError::CouponExpired(self.code.clone()));
        }
        if !self.active {
            return Err(OrderError::CouponNotActive(self.code.clone()));
        }
        Ok(())
    }

    /// Applies the discount: `price · (1 − discount/100)`.
    pub fn apply(&self, price: f64) -> f64 {
        price * (1.0 - self.discount / 100.0)
    }
}
