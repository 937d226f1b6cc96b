//! Error types for the onboarding engine.

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    #[error("Onboarding error: {0}")]
    Onboarding(#[from] OnboardingError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Persistence errors. All variants are retryable from the caller's
/// perspective: the step cursor never advances past a failed write.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Form validation errors — block a transition, recoverable by correction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    MissingField { field: &'static str },

    #[error("{field} must contain at least one entry")]
    EmptyList { field: &'static str },

    #[error("{field} must be a positive value")]
    NotPositive { field: &'static str },

    #[error("{field} is not a valid email address")]
    InvalidEmail { field: &'static str },
}

/// Payment provider errors. A payment failure never leaves the
/// Subscription step; skip remains available in every case.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("No payment provider configured")]
    NotConfigured,

    #[error("Order creation failed: {reason}")]
    OrderCreate { reason: String },

    #[error("Capture failed for order {order_id}: {reason}")]
    Capture { order_id: String, reason: String },

    #[error("Payment provider request failed: {reason}")]
    Provider { reason: String },

    #[error("Invalid response from payment provider: {reason}")]
    InvalidResponse { reason: String },
}

/// State machine errors.
#[derive(Debug, thiserror::Error)]
pub enum OnboardingError {
    #[error("Role is locked for this session")]
    RoleLocked,

    #[error("Invalid transition from {step} on {event}")]
    InvalidTransition { step: String, event: String },

    #[error("Submitted draft is for role {submitted}, account role is {account}")]
    DraftRoleMismatch { submitted: String, account: String },

    #[error("Onboarding already completed")]
    AlreadyCompleted,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Payment(#[from] PaymentError),
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
