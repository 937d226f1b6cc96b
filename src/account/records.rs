//! Durable role records, promoted from the staged draft at finalization.
//!
//! One collection per non-student role, each record created at most once
//! per account. Once a record exists it is the system of record for that
//! role's public profile; the account's staged draft becomes historical.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::roles::{Role, RoleProfileDraft};

/// Review state of a promoted role record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Rejected,
}

impl Default for VerificationStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: Uuid,
    pub subject_id: String,
    pub company_name: String,
    pub business_license: String,
    pub payout_email: String,
    /// Human-readable code agents hand out to referred students.
    pub referral_code: String,
    pub verification_status: VerificationStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TutorRecord {
    pub id: Uuid,
    pub subject_id: String,
    pub specializations: Vec<String>,
    pub experience_years: u32,
    pub hourly_rate: Decimal,
    pub payout_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    pub verification_status: VerificationStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchoolRecord {
    pub id: Uuid,
    pub subject_id: String,
    pub name: String,
    pub location: String,
    pub website: String,
    pub school_type: String,
    pub verification_status: VerificationStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorRecord {
    pub id: Uuid,
    pub subject_id: String,
    pub business_name: String,
    pub service_categories: Vec<String>,
    pub payout_email: String,
    pub verification_status: VerificationStatus,
    pub created_at: DateTime<Utc>,
}

/// A record in any of the role collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RoleRecord {
    Agent(AgentRecord),
    Tutor(TutorRecord),
    School(SchoolRecord),
    Vendor(VendorRecord),
}

impl RoleRecord {
    /// Promote a staged draft into a fresh record for `subject_id`.
    pub fn from_draft(subject_id: &str, draft: &RoleProfileDraft) -> Self {
        let now = Utc::now();
        match draft {
            RoleProfileDraft::Agent(d) => Self::Agent(AgentRecord {
                id: Uuid::new_v4(),
                subject_id: subject_id.to_string(),
                company_name: d.company_name.clone(),
                business_license: d.business_license.clone(),
                payout_email: d.payout_email.clone(),
                referral_code: generate_reference_code("AGT"),
                verification_status: VerificationStatus::Pending,
                created_at: now,
            }),
            RoleProfileDraft::Tutor(d) => Self::Tutor(TutorRecord {
                id: Uuid::new_v4(),
                subject_id: subject_id.to_string(),
                specializations: d.specializations.clone(),
                experience_years: d.experience_years,
                hourly_rate: d.hourly_rate,
                payout_email: d.payout_email.clone(),
                bio: d.bio.clone(),
                verification_status: VerificationStatus::Pending,
                created_at: now,
            }),
            RoleProfileDraft::School(d) => Self::School(SchoolRecord {
                id: Uuid::new_v4(),
                subject_id: subject_id.to_string(),
                name: d.name.clone(),
                location: d.location.clone(),
                website: d.website.clone(),
                school_type: d.school_type.clone(),
                verification_status: VerificationStatus::Pending,
                created_at: now,
            }),
            RoleProfileDraft::Vendor(d) => Self::Vendor(VendorRecord {
                id: Uuid::new_v4(),
                subject_id: subject_id.to_string(),
                business_name: d.business_name.clone(),
                service_categories: d.service_categories.clone(),
                payout_email: d.payout_email.clone(),
                verification_status: VerificationStatus::Pending,
                created_at: now,
            }),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Self::Agent(_) => Role::Agent,
            Self::Tutor(_) => Role::Tutor,
            Self::School(_) => Role::School,
            Self::Vendor(_) => Role::Vendor,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Self::Agent(r) => r.id,
            Self::Tutor(r) => r.id,
            Self::School(r) => r.id,
            Self::Vendor(r) => r.id,
        }
    }

    pub fn subject_id(&self) -> &str {
        match self {
            Self::Agent(r) => &r.subject_id,
            Self::Tutor(r) => &r.subject_id,
            Self::School(r) => &r.subject_id,
            Self::Vendor(r) => &r.subject_id,
        }
    }

    pub fn verification_status(&self) -> VerificationStatus {
        match self {
            Self::Agent(r) => r.verification_status,
            Self::Tutor(r) => r.verification_status,
            Self::School(r) => r.verification_status,
            Self::Vendor(r) => r.verification_status,
        }
    }
}

/// Generate a human-readable reference code, e.g. `AGT-7FK2MN`.
///
/// The charset omits 0/O/1/I/L to keep codes unambiguous when read aloud.
pub fn generate_reference_code(prefix: &str) -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
    let mut rng = rand::thread_rng();
    let code: String = (0..6)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();
    format!("{prefix}-{code}")
}
