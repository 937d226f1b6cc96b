//! Configuration types.

use secrecy::SecretString;

use crate::error::ConfigError;

/// Payment provider credentials.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// Orders API base URL (sandbox by default).
    pub api_base: String,
    pub client_id: String,
    pub secret: SecretString,
}

impl PaymentConfig {
    /// Read credentials from the environment.
    ///
    /// Returns `None` when no provider is configured — a supported setup:
    /// the Subscription step degrades to skip-only.
    pub fn from_env() -> Option<Self> {
        let client_id = std::env::var("EDUMARKET_PAYMENT_CLIENT_ID").ok()?;
        let secret = std::env::var("EDUMARKET_PAYMENT_SECRET").ok()?;
        let api_base = std::env::var("EDUMARKET_PAYMENT_API_BASE")
            .unwrap_or_else(|_| "https://api-m.sandbox.paypal.com".to_string());
        Some(Self {
            api_base,
            client_id,
            secret: SecretString::from(secret),
        })
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path to the local database file.
    pub db_path: String,
    /// HTTP bind port.
    pub port: u16,
    pub payment: Option<PaymentConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port_raw = std::env::var("EDUMARKET_PORT").unwrap_or_else(|_| "8080".to_string());
        let port = port_raw
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidValue {
                key: "EDUMARKET_PORT".to_string(),
                message: format!("{port_raw:?}: {e}"),
            })?;

        let db_path = std::env::var("EDUMARKET_DB_PATH")
            .unwrap_or_else(|_| "./data/edumarket.db".to_string());

        Ok(Self {
            db_path,
            port,
            payment: PaymentConfig::from_env(),
        })
    }
}
