//! Payment integration — external order capture behind a provider trait,
//! wrapped in an explicit gateway sub-machine for the Subscription step.

pub mod gateway;
pub mod provider;

pub use gateway::{Decision, GatewayNotice, GatewayState, SubscriptionGateway};
pub use provider::{Capture, CreateOrder, HttpPaymentProvider, PaymentProvider};
