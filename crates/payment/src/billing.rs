//! Billing collaborator seam.
//!
//! The provider is an external synchronous payment processor: a charge may
//! take tens of seconds and may fail. Callers bound it with a timeout.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::Currency;
use thiserror::Error;
use uuid::Uuid;

/// Errors from the billing collaborator.
#[derive(Debug, Error)]
pub enum BillingError {
    /// The provider rejected the charge.
    #[error("billing declined: {0}")]
    Declined(String),

    /// The charge did not settle within the configured bound.
    #[error("billing timed out")]
    Timeout,

    /// The provider could not be reached.
    #[error("billing unavailable: {0}")]
    Unavailable(String),
}

/// Successful charge result.
#[derive(Debug, Clone)]
pub struct BillingReceipt {
    /// Where the payer completes the flow.
    pub redirect_url: String,
}

/// External payment provider.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Initiates a charge; resolves once the provider settles it.
    async fn new_payment(
        &self,
        currency: Currency,
        total_price: f64,
        description: &str,
    ) -> Result<BillingReceipt, BillingError>;
}

#[derive(Debug, Default)]
struct InMemoryBillingState {
    charges: Vec<(Currency, f64, String)>,
    fail_on_charge: bool,
    delay: Option<Duration>,
}

/// In-memory billing provider for tests and the single-process binary.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBillingProvider {
    state: Arc<Mutex<InMemoryBillingState>>,
}

impl InMemoryBillingProvider {
    /// Creates a provider that approves every charge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the provider to decline charges.
    pub fn set_fail_on_charge(&self, fail: bool) {
        self.state.lock().unwrap().fail_on_charge = fail;
    }

    /// Adds artificial settlement latency.
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    /// Returns the number of settled charges.
    pub fn charge_count(&self) -> usize {
        self.state.lock().unwrap().charges.len()
    }
}

#[async_trait]
impl BillingProvider for InMemoryBillingProvider {
    async fn new_payment(
        &self,
        currency: Currency,
        total_price: f64,
        description: &str,
    ) -> Result<BillingReceipt, BillingError> {
        let delay = self.state.lock().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        if state.fail_on_charge {
            return Err(BillingError::Declined("insufficient funds".to_string()));
        }
        state
            .charges
            .push((currency, total_price, description.to_string()));
        Ok(BillingReceipt {
            redirect_url: format!("https://billing.example/confirm/{}", Uuid::new_v4()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn charge_returns_a_redirect_url() {
        let provider = InMemoryBillingProvider::new();
        let receipt = provider
            .new_payment(Currency::Usd, 100.0, "Order test")
            .await
            .unwrap();
        assert!(receipt.redirect_url.starts_with("https://billing.example/"));
        assert_eq!(provider.charge_count(), 1);
    }

    #[tokio::test]
    async fn fail_on_charge_declines() {
        let provider = InMemoryBillingProvider::new();
        provider.set_fail_on_charge(true);

        let result = provider.new_payment(Currency::Usd, 100.0, "Order test").await;
        assert!(matches!(result, Err(BillingError::Declined(_))));
        assert_eq!(provider.charge_count(), 0);
    }

    #[tokio::test]
    async fn delayed_charge_can_be_bounded_by_timeout() {
        let provider = InMemoryBillingProvider::new();
        provider.set_delay(Duration::from_secs(5));

        let result = tokio::time::timeout(
            Duration::from_millis(50),
            provider.new_payment(Currency::Usd, 100.0, "Order test"),
        )
        .await;
        assert!(result.is_err());
    }
}
