//! Payment provider trait and the HTTP implementation.
//!
//! The engine only needs two operations from the provider: create an order
//! for a given amount, and capture an approved order. Everything else about
//! the widget's lifecycle stays client-side; the server sees order ids and
//! capture results.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::PaymentError;

/// Order parameters sent to the provider.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
}

/// Result of a successful capture.
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub transaction_id: String,
    pub payer_email: Option<String>,
    pub captured_at: DateTime<Utc>,
}

/// Async interface to the external payment provider.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create an order, returning the provider's order id.
    async fn create_order(&self, order: &CreateOrder) -> Result<String, PaymentError>;

    /// Capture an approved order.
    async fn capture_order(&self, order_id: &str) -> Result<Capture, PaymentError>;
}

/// Credentials for the hosted orders API.
#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    pub api_base: String,
    pub client_id: String,
    pub secret: SecretString,
}

/// Provider implementation against a PayPal-style orders REST API:
/// client-credentials token, then create/capture order calls.
pub struct HttpPaymentProvider {
    client: reqwest::Client,
    credentials: ProviderCredentials,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct OrderResponse {
    id: String,
}

#[derive(Deserialize)]
struct CaptureResponse {
    status: String,
    #[serde(default)]
    purchase_units: Vec<PurchaseUnit>,
    #[serde(default)]
    payer: Option<Payer>,
}

#[derive(Deserialize, Default)]
struct PurchaseUnit {
    #[serde(default)]
    payments: Option<Payments>,
}

#[derive(Deserialize, Default)]
struct Payments {
    #[serde(default)]
    captures: Vec<CaptureDetail>,
}

#[derive(Deserialize)]
struct CaptureDetail {
    id: String,
}

#[derive(Deserialize)]
struct Payer {
    #[serde(default)]
    email_address: Option<String>,
}

impl HttpPaymentProvider {
    pub fn new(credentials: ProviderCredentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
        }
    }

    async fn access_token(&self) -> Result<String, PaymentError> {
        let url = format!("{}/v1/oauth2/token", self.credentials.api_base);
        let response = self
            .client
            .post(&url)
            .basic_auth(
                &self.credentials.client_id,
                Some(self.credentials.secret.expose_secret()),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| PaymentError::Provider {
                reason: format!("token request: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(PaymentError::Provider {
                reason: format!("token request returned {}", response.status()),
            });
        }

        let token: TokenResponse =
            response
                .json()
                .await
                .map_err(|e| PaymentError::InvalidResponse {
                    reason: format!("token body: {e}"),
                })?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl PaymentProvider for HttpPaymentProvider {
    async fn create_order(&self, order: &CreateOrder) -> Result<String, PaymentError> {
        let token = self.access_token().await?;
        let url = format!("{}/v2/checkout/orders", self.credentials.api_base);
        let body = serde_json::json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "amount": {
                    "currency_code": order.currency,
                    "value": order.amount.to_string(),
                },
                "description": order.description,
            }],
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentError::OrderCreate {
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(PaymentError::OrderCreate {
                reason: format!("provider returned {}", response.status()),
            });
        }

        let created: OrderResponse =
            response
                .json()
                .await
                .map_err(|e| PaymentError::InvalidResponse {
                    reason: format!("order body: {e}"),
                })?;
        tracing::debug!(order_id = %created.id, "Payment order created");
        Ok(created.id)
    }

    async fn capture_order(&self, order_id: &str) -> Result<Capture, PaymentError> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/v2/checkout/orders/{order_id}/capture",
            self.credentials.api_base
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| PaymentError::Capture {
                order_id: order_id.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(PaymentError::Capture {
                order_id: order_id.to_string(),
                reason: format!("provider returned {}", response.status()),
            });
        }

        let captured: CaptureResponse =
            response
                .json()
                .await
                .map_err(|e| PaymentError::InvalidResponse {
                    reason: format!("capture body: {e}"),
                })?;

        if captured.status != "COMPLETED" {
            return Err(PaymentError::Capture {
                order_id: order_id.to_string(),
                reason: format!("capture status {}", captured.status),
            });
        }

        let transaction_id = captured
            .purchase_units
            .first()
            .and_then(|u| u.payments.as_ref())
            .and_then(|p| p.captures.first())
            .map(|c| c.id.clone())
            .ok_or_else(|| PaymentError::InvalidResponse {
                reason: "capture response missing transaction id".to_string(),
            })?;

        tracing::info!(order_id = %order_id, transaction_id = %transaction_id, "Payment captured");
        Ok(Capture {
            transaction_id,
            payer_email: captured.payer.and_then(|p| p.email_address),
            captured_at: Utc::now(),
        })
    }
}
