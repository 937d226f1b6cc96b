//! Account document — one per authenticated identity.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::onboarding::step::OnboardingStep;
use crate::roles::{Role, RoleProfileDraft};

/// Subscription state recorded on the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    None,
    Active,
    Skipped,
}

impl Default for SubscriptionStatus {
    fn default() -> Self {
        Self::None
    }
}

/// Subscription fields, written once at finalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub active: bool,
    pub status: SubscriptionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
}

/// The account document, keyed by the identity provider's subject id.
///
/// `subject_id` and `email` are immutable after creation. The rest changes
/// through `AccountPatch` merges until onboarding completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub subject_id: String,
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub role_locked: bool,
    #[serde(default)]
    pub onboarding_step: OnboardingStep,
    #[serde(default)]
    pub onboarding_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_profile_draft: Option<RoleProfileDraft>,
    #[serde(default)]
    pub subscription: Subscription,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Fresh account for a newly authenticated identity.
    ///
    /// `role_hint` seeds the role without locking it; locking is the
    /// machine's entry-resolution concern.
    pub fn bootstrap(
        subject_id: &str,
        email: &str,
        full_name: Option<&str>,
        role_hint: Option<Role>,
    ) -> Self {
        let now = Utc::now();
        Self {
            subject_id: subject_id.to_string(),
            email: email.to_string(),
            full_name: full_name.unwrap_or_default().to_string(),
            phone: String::new(),
            country: String::new(),
            country_code: None,
            role: role_hint.unwrap_or_default(),
            role_locked: false,
            onboarding_step: OnboardingStep::ChooseRole,
            onboarding_completed: false,
            role_profile_draft: None,
            subscription: Subscription::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for an account — one `Option` per mutable field.
///
/// Only present fields are written; `subject_id`, `email`, and
/// `created_at` are never patched. The double-`Option` on the draft
/// distinguishes "leave as is" (`None`) from "clear" (`Some(None)`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_locked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onboarding_step: Option<OnboardingStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onboarding_completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_profile_draft: Option<Option<RoleProfileDraft>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<Subscription>,
}

impl AccountPatch {
    /// Whether the patch writes anything at all.
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.phone.is_none()
            && self.country.is_none()
            && self.country_code.is_none()
            && self.role.is_none()
            && self.role_locked.is_none()
            && self.onboarding_step.is_none()
            && self.onboarding_completed.is_none()
            && self.role_profile_draft.is_none()
            && self.subscription.is_none()
    }

    /// Merge the present fields into `account`, field by field.
    ///
    /// Shared by the memory backend and by the machine's in-memory
    /// snapshot, so both always agree on merge semantics.
    pub fn apply_to(&self, account: &mut Account) {
        if let Some(v) = &self.full_name {
            account.full_name = v.clone();
        }
        if let Some(v) = &self.phone {
            account.phone = v.clone();
        }
        if let Some(v) = &self.country {
            account.country = v.clone();
        }
        if let Some(v) = &self.country_code {
            account.country_code = Some(v.clone());
        }
        if let Some(v) = self.role {
            account.role = v;
        }
        if let Some(v) = self.role_locked {
            account.role_locked = v;
        }
        if let Some(v) = self.onboarding_step {
            account.onboarding_step = v;
        }
        if let Some(v) = self.onboarding_completed {
            account.onboarding_completed = v;
        }
        if let Some(v) = &self.role_profile_draft {
            account.role_profile_draft = v.clone();
        }
        if let Some(v) = &self.subscription {
            account.subscription = v.clone();
        }
        account.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::roles::TutorDraft;

    use super::*;

    #[test]
    fn bootstrap_defaults() {
        let account = Account::bootstrap("sub_1", "a@example.com", Some("Ann"), None);
        assert_eq!(account.role, Role::Student);
        assert!(!account.role_locked);
        assert_eq!(account.onboarding_step, OnboardingStep::ChooseRole);
        assert!(!account.onboarding_completed);
        assert_eq!(account.subscription.status, SubscriptionStatus::None);
        assert!(account.role_profile_draft.is_none());
    }

    #[test]
    fn patch_merges_only_present_fields() {
        let mut account = Account::bootstrap("sub_1", "a@example.com", None, Some(Role::Tutor));
        account.phone = "+15550000".to_string();

        let patch = AccountPatch {
            full_name: Some("Ann Lee".to_string()),
            onboarding_step: Some(OnboardingStep::BasicInfo),
            ..Default::default()
        };
        patch.apply_to(&mut account);

        assert_eq!(account.full_name, "Ann Lee");
        assert_eq!(account.onboarding_step, OnboardingStep::BasicInfo);
        // Untouched fields survive the merge.
        assert_eq!(account.phone, "+15550000");
        assert_eq!(account.role, Role::Tutor);
    }

    #[test]
    fn patch_can_clear_draft() {
        let mut account = Account::bootstrap("sub_1", "a@example.com", None, Some(Role::Tutor));
        account.role_profile_draft = Some(RoleProfileDraft::Tutor(TutorDraft {
            specializations: vec!["math".to_string()],
            experience_years: 2,
            hourly_rate: dec!(30),
            payout_email: "t@example.com".to_string(),
            bio: None,
        }));

        let patch = AccountPatch {
            role_profile_draft: Some(None),
            ..Default::default()
        };
        patch.apply_to(&mut account);
        assert!(account.role_profile_draft.is_none());
    }

    #[test]
    fn empty_patch_is_empty() {
        assert!(AccountPatch::default().is_empty());
        let patch = AccountPatch {
            role_locked: Some(true),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn account_serde_roundtrip() {
        let account = Account::bootstrap("sub_9", "s@example.com", Some("Sam"), Some(Role::Vendor));
        let json = serde_json::to_string(&account).unwrap();
        let parsed: Account = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, account);
    }
}
