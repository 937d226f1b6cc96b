//! Onboarding step cursor — tracks where an account is in its sequence.
//!
//! The sequence depends on the account's role: students go
//! `ChooseRole → BasicInfo → Complete`, every other role goes
//! `ChooseRole → BasicInfo → RoleSpecific → Subscription → Complete`.
//! The cursor is persisted on the account so a reload resumes rather than
//! restarts.

use serde::{Deserialize, Serialize};

use crate::roles::Role;

/// Steps of the onboarding flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    ChooseRole,
    BasicInfo,
    RoleSpecific,
    Subscription,
    Complete,
}

impl Default for OnboardingStep {
    fn default() -> Self {
        Self::ChooseRole
    }
}

impl OnboardingStep {
    /// Whether this step is terminal (onboarding is done).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Whether this step appears in `role`'s sequence.
    pub fn is_valid_for(&self, role: Role) -> bool {
        role.steps().contains(self)
    }

    /// The step after `self` in `role`'s sequence, if any.
    pub fn next_for(&self, role: Role) -> Option<OnboardingStep> {
        let steps = role.steps();
        let idx = steps.iter().position(|s| s == self)?;
        steps.get(idx + 1).copied()
    }

    /// The step before `self` in `role`'s sequence, if any.
    ///
    /// Lock handling is the machine's concern: a locked account treats
    /// `BasicInfo → ChooseRole` as a no-op regardless of what this returns.
    pub fn back_for(&self, role: Role) -> Option<OnboardingStep> {
        let steps = role.steps();
        let idx = steps.iter().position(|s| s == self)?;
        idx.checked_sub(1).map(|i| steps[i])
    }
}

impl std::fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ChooseRole => "choose_role",
            Self::BasicInfo => "basic_info",
            Self::RoleSpecific => "role_specific",
            Self::Subscription => "subscription",
            Self::Complete => "complete",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_sequence_walks_all_steps() {
        use OnboardingStep::*;
        let expected = [BasicInfo, RoleSpecific, Subscription, Complete];
        let mut current = ChooseRole;
        for expected_next in expected {
            let next = current.next_for(Role::Tutor).unwrap();
            assert_eq!(next, expected_next);
            current = next;
        }
        assert!(current.next_for(Role::Tutor).is_none());
        assert!(current.is_terminal());
    }

    #[test]
    fn student_sequence_skips_middle_steps() {
        use OnboardingStep::*;
        assert_eq!(ChooseRole.next_for(Role::Student), Some(BasicInfo));
        assert_eq!(BasicInfo.next_for(Role::Student), Some(Complete));
        assert!(!RoleSpecific.is_valid_for(Role::Student));
        assert!(!Subscription.is_valid_for(Role::Student));
        assert!(RoleSpecific.next_for(Role::Student).is_none());
    }

    #[test]
    fn back_is_symmetric() {
        use OnboardingStep::*;
        assert_eq!(Complete.back_for(Role::Agent), Some(Subscription));
        assert_eq!(Subscription.back_for(Role::Agent), Some(RoleSpecific));
        assert_eq!(RoleSpecific.back_for(Role::Agent), Some(BasicInfo));
        assert_eq!(BasicInfo.back_for(Role::Agent), Some(ChooseRole));
        assert!(ChooseRole.back_for(Role::Agent).is_none());

        assert_eq!(Complete.back_for(Role::Student), Some(BasicInfo));
    }

    #[test]
    fn display_matches_serde() {
        use OnboardingStep::*;
        for step in [ChooseRole, BasicInfo, RoleSpecific, Subscription, Complete] {
            let display = format!("{step}");
            let json = serde_json::to_string(&step).unwrap();
            assert_eq!(format!("\"{display}\""), json);
        }
    }
}
