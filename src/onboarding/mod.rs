//! Onboarding workflow engine.
//!
//! Takes a freshly authenticated identity through role selection,
//! role-specific profile capture, optional subscription purchase, and
//! finalization into durable role records. Progress is persisted at every
//! transition, so reloads and parallel tabs resume instead of restarting,
//! and finalization is idempotent under duplicate delivery.

pub mod finalizer;
pub mod machine;
pub mod routes;
pub mod session;
pub mod step;

pub use finalizer::{FinalizeOutcome, ProfileFinalizer, RoleRecordOutcome};
pub use machine::{OnboardingEvent, OnboardingMachine, OnboardingStatus, Transition};
pub use routes::{OnboardingRouteState, onboarding_routes};
pub use session::{EntryHint, Identity, SessionContext};
pub use step::OnboardingStep;
