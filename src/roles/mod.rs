//! Role system — the marketplace's account roles and their onboarding shape.
//!
//! The registry is a pure lookup table: step sequences, required-field
//! validation, and subscription pricing, all dispatched exhaustively over
//! `Role`. No side effects live here.

pub mod draft;
pub mod registry;

pub use draft::{AgentDraft, BasicInfo, RoleProfileDraft, SchoolDraft, TutorDraft, VendorDraft};
pub use registry::{Pricing, Role, validate_basic_info, validate_draft};
