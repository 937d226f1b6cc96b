//! Role-shaped profile drafts staged during onboarding.
//!
//! The draft is a tagged union over the non-student roles. It is staged on
//! the account while the user works through the RoleSpecific step, and
//! promoted into a dedicated role record at finalization. Students have no
//! draft — their sequence skips the RoleSpecific step entirely.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::registry::Role;

/// Basic-info fields captured for every role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicInfo {
    pub full_name: String,
    pub phone: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
}

/// Staged agent profile fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDraft {
    pub company_name: String,
    pub business_license: String,
    pub payout_email: String,
}

/// Staged tutor profile fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TutorDraft {
    pub specializations: Vec<String>,
    pub experience_years: u32,
    pub hourly_rate: Decimal,
    pub payout_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

/// Staged school profile fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolDraft {
    pub name: String,
    pub location: String,
    pub website: String,
    pub school_type: String,
}

/// Staged vendor profile fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorDraft {
    pub business_name: String,
    pub service_categories: Vec<String>,
    pub payout_email: String,
}

/// Tagged union of the role-shaped drafts.
///
/// Serialized with an internal `role` tag so a persisted draft always
/// carries the role it was captured for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RoleProfileDraft {
    Agent(AgentDraft),
    Tutor(TutorDraft),
    School(SchoolDraft),
    Vendor(VendorDraft),
}

impl RoleProfileDraft {
    /// The role this draft was captured for.
    pub fn role(&self) -> Role {
        match self {
            Self::Agent(_) => Role::Agent,
            Self::Tutor(_) => Role::Tutor,
            Self::School(_) => Role::School,
            Self::Vendor(_) => Role::Vendor,
        }
    }
}
