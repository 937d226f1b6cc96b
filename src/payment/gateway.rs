//! Subscription gateway — the Subscription step's widget lifecycle as an
//! explicit finite-state sub-machine.
//!
//! Isolates the onboarding flow from the payment widget's own quirks: the
//! widget's callbacks arrive as typed events, and the gateway's output is
//! a single `Decision` the finalizer consumes. "Skip for now" is available
//! from every state, so a broken or unconfigured provider never strands
//! the user.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::PaymentError;
use crate::roles::{Pricing, Role};

use super::provider::{CreateOrder, PaymentProvider};

/// Lifecycle of the payment widget on the Subscription step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GatewayState {
    Idle,
    Loading,
    Ready { order_id: String },
    Failed { reason: String },
}

/// Non-fatal notices surfaced to the user; the step does not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum GatewayNotice {
    Cancelled,
    Errored { reason: String },
}

/// Finalization decision produced by the Subscription step.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Active {
        plan: String,
        amount: Decimal,
        currency: String,
        order_id: String,
        transaction_id: String,
        payer_email: Option<String>,
        captured_at: DateTime<Utc>,
    },
    Skipped,
}

impl Decision {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}

/// Wraps the provider for one role's Subscription step.
pub struct SubscriptionGateway {
    provider: Option<Arc<dyn PaymentProvider>>,
    pricing: Pricing,
    state: GatewayState,
}

impl SubscriptionGateway {
    /// Gateway for `role`'s pricing. `None` for student — students never
    /// reach the Subscription step.
    pub fn for_role(role: Role, provider: Option<Arc<dyn PaymentProvider>>) -> Option<Self> {
        let pricing = role.pricing()?;
        Some(Self {
            provider,
            pricing,
            state: GatewayState::Idle,
        })
    }

    pub fn state(&self) -> &GatewayState {
        &self.state
    }

    pub fn pricing(&self) -> &Pricing {
        &self.pricing
    }

    /// Initialize the widget: create an order for the role's pricing.
    ///
    /// No provider configured is a supported degradation, not a fault: the
    /// gateway lands in `Failed` and the user keeps the skip path.
    pub async fn init(&mut self) -> &GatewayState {
        let Some(provider) = self.provider.clone() else {
            self.state = GatewayState::Failed {
                reason: "no payment provider configured; skip is available".to_string(),
            };
            return &self.state;
        };

        self.state = GatewayState::Loading;
        let order = CreateOrder {
            amount: self.pricing.amount,
            currency: self.pricing.currency.to_string(),
            description: self.pricing.label.to_string(),
        };
        match provider.create_order(&order).await {
            Ok(order_id) => {
                tracing::debug!(order_id = %order_id, "Subscription order ready");
                self.state = GatewayState::Ready { order_id };
            }
            Err(e) => {
                tracing::warn!(error = %e, "Subscription order creation failed");
                self.state = GatewayState::Failed {
                    reason: e.to_string(),
                };
            }
        }
        &self.state
    }

    /// The widget approved `order_id` — capture it.
    ///
    /// On capture failure the gateway state is untouched and the error is
    /// retryable; the user stays on the Subscription step.
    pub async fn on_approve(&mut self, order_id: &str) -> Result<Decision, PaymentError> {
        let provider = self.provider.clone().ok_or(PaymentError::NotConfigured)?;
        let capture = provider.capture_order(order_id).await?;
        Ok(Decision::Active {
            plan: self.pricing.label.to_string(),
            amount: self.pricing.amount,
            currency: self.pricing.currency.to_string(),
            order_id: order_id.to_string(),
            transaction_id: capture.transaction_id,
            payer_email: capture.payer_email,
            captured_at: capture.captured_at,
        })
    }

    /// The widget reported a user cancellation. State is unchanged.
    pub fn on_cancel(&self) -> GatewayNotice {
        tracing::debug!("Subscription widget cancelled");
        GatewayNotice::Cancelled
    }

    /// The widget reported an error. State is unchanged; retry or skip.
    pub fn on_error(&self, reason: &str) -> GatewayNotice {
        tracing::warn!(reason = %reason, "Subscription widget error");
        GatewayNotice::Errored {
            reason: reason.to_string(),
        }
    }

    /// Escape hatch, available regardless of gateway state.
    pub fn skip(&self) -> Decision {
        Decision::Skipped
    }
}
