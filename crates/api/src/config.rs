//! Application configuration loaded from environment variables.

use std::time::Duration;

use messaging::RelayConfig;
use payment::BillingWorkerConfig;

/// Process configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `DATABASE_URL` — Postgres DSN; without it the in-memory stores are used
/// - `OUTBOX_TICK_MS` — relay tick interval (default: `1000`)
/// - `OUTBOX_BATCH` — rows per relay tick (default: `10`)
/// - `BILLING_TIMEOUT_SECS` — bound on one billing call (default: `60`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub outbox_tick: Duration,
    pub outbox_batch: i64,
    pub billing_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            database_url: std::env::var("DATABASE_URL").ok(),
            outbox_tick: Duration::from_millis(
                std::env::var("OUTBOX_TICK_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1000),
            ),
            outbox_batch: std::env::var("OUTBOX_BATCH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            billing_timeout: Duration::from_secs(
                std::env::var("BILLING_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60),
            ),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Relay settings derived from this configuration.
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            tick: self.outbox_tick,
            batch_size: self.outbox_batch,
        }
    }

    /// Billing driver settings derived from this configuration.
    pub fn billing_config(&self) -> BillingWorkerConfig {
        BillingWorkerConfig {
            tick: self.outbox_tick,
            batch_size: self.outbox_batch,
            charge_timeout: self.billing_timeout,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            outbox_tick: Duration::from_millis(1000),
            outbox_batch: 10,
            billing_timeout: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.outbox_batch, 10);
        assert_eq!(config.outbox_tick, Duration::from_millis(1000));
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Default::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_worker_configs_inherit_tuning() {
        let config = Config {
            outbox_tick: Duration::from_millis(50),
            outbox_batch: 3,
            billing_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        assert_eq!(config.relay_config().batch_size, 3);
        assert_eq!(config.relay_config().tick, Duration::from_millis(50));
        assert_eq!(config.billing_config().charge_timeout, Duration::from_secs(5));
    }
}
