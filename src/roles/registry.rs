//! Role registry — step sequences, validation rules, and pricing.

use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::onboarding::step::OnboardingStep;

use super::draft::{BasicInfo, RoleProfileDraft};

/// Account roles in the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Agent,
    Tutor,
    School,
    Vendor,
}

impl Default for Role {
    fn default() -> Self {
        Self::Student
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Student => "student",
            Self::Agent => "agent",
            Self::Tutor => "tutor",
            Self::School => "school",
            Self::Vendor => "vendor",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Self::Student),
            "agent" => Ok(Self::Agent),
            "tutor" => Ok(Self::Tutor),
            "school" => Ok(Self::School),
            "vendor" => Ok(Self::Vendor),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Student sequence — no role-specific capture, no subscription.
static STUDENT_STEPS: &[OnboardingStep] = &[
    OnboardingStep::ChooseRole,
    OnboardingStep::BasicInfo,
    OnboardingStep::Complete,
];

/// Provider sequence shared by agent, tutor, school, and vendor.
static PROVIDER_STEPS: &[OnboardingStep] = &[
    OnboardingStep::ChooseRole,
    OnboardingStep::BasicInfo,
    OnboardingStep::RoleSpecific,
    OnboardingStep::Subscription,
    OnboardingStep::Complete,
];

/// Subscription pricing shown on the Subscription step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pricing {
    pub label: &'static str,
    pub amount: Decimal,
    pub currency: &'static str,
}

impl Role {
    /// Ordered onboarding step sequence for this role.
    pub fn steps(&self) -> &'static [OnboardingStep] {
        match self {
            Self::Student => STUDENT_STEPS,
            Self::Agent | Self::Tutor | Self::School | Self::Vendor => PROVIDER_STEPS,
        }
    }

    /// Subscription pricing for this role. Students never reach the
    /// Subscription step and have no pricing.
    pub fn pricing(&self) -> Option<Pricing> {
        let (label, amount) = match self {
            Self::Student => return None,
            Self::Agent => ("Agent annual listing", dec!(49.99)),
            Self::Tutor => ("Tutor annual listing", dec!(29.99)),
            Self::School => ("School annual listing", dec!(99.99)),
            Self::Vendor => ("Vendor annual listing", dec!(39.99)),
        };
        Some(Pricing {
            label,
            amount,
            currency: "USD",
        })
    }
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"))
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField { field });
    }
    Ok(())
}

fn require_email(field: &'static str, value: &str) -> Result<(), ValidationError> {
    require(field, value)?;
    if !email_regex().is_match(value.trim()) {
        return Err(ValidationError::InvalidEmail { field });
    }
    Ok(())
}

/// Validate the basic-info fields every role must supply.
pub fn validate_basic_info(info: &BasicInfo) -> Result<(), ValidationError> {
    require("full_name", &info.full_name)?;
    require("phone", &info.phone)?;
    require("country", &info.country)?;
    Ok(())
}

/// Validate a role-shaped draft against the registry's required-field rules.
pub fn validate_draft(draft: &RoleProfileDraft) -> Result<(), ValidationError> {
    match draft {
        RoleProfileDraft::Agent(d) => {
            require("company_name", &d.company_name)?;
            require("business_license", &d.business_license)?;
            require_email("payout_email", &d.payout_email)?;
        }
        RoleProfileDraft::Tutor(d) => {
            if d.specializations.iter().all(|s| s.trim().is_empty()) {
                return Err(ValidationError::EmptyList {
                    field: "specializations",
                });
            }
            if d.experience_years == 0 {
                return Err(ValidationError::NotPositive {
                    field: "experience_years",
                });
            }
            if d.hourly_rate <= Decimal::ZERO {
                return Err(ValidationError::NotPositive {
                    field: "hourly_rate",
                });
            }
            require_email("payout_email", &d.payout_email)?;
        }
        RoleProfileDraft::School(d) => {
            require("name", &d.name)?;
            require("location", &d.location)?;
            require("website", &d.website)?;
            require("school_type", &d.school_type)?;
        }
        RoleProfileDraft::Vendor(d) => {
            require("business_name", &d.business_name)?;
            if d.service_categories.iter().all(|s| s.trim().is_empty()) {
                return Err(ValidationError::EmptyList {
                    field: "service_categories",
                });
            }
            require_email("payout_email", &d.payout_email)?;
        }
    }
    Ok(())
}
