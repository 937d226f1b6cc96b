//! Account data model — the per-identity document and its role records.

pub mod model;
pub mod records;

pub use model::{Account, AccountPatch, Subscription, SubscriptionStatus};
pub use records::{
    AgentRecord, RoleRecord, SchoolRecord, TutorRecord, VendorRecord, VerificationStatus,
};
