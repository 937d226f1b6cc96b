//! Profile finalizer — terminal commit of the onboarding flow.
//!
//! Finalization marks the account complete and promotes the staged draft
//! into a durable role record, at most once. It is safe under
//! at-least-once invocation: network retries and duplicate approve
//! callbacks from the payment widget both land on the idempotency guard.

use std::sync::Arc;
use std::time::Duration;

use crate::account::{Account, AccountPatch, RoleRecord, Subscription, SubscriptionStatus};
use crate::error::{OnboardingError, StoreError};
use crate::onboarding::step::OnboardingStep;
use crate::payment::Decision;
use crate::roles::Role;
use crate::store::Store;

/// What happened to the role record during finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleRecordOutcome {
    /// Student — no role record exists for this role.
    NotApplicable,
    Created,
    /// A record already existed (earlier finalize, or a racing session).
    AlreadyExists,
    /// Creation failed; the account is still complete. Logged for
    /// reconciliation.
    Failed,
}

/// Result of a finalize call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FinalizeOutcome {
    /// The account was already complete; nothing was touched.
    AlreadyCompleted,
    Completed { role_record: RoleRecordOutcome },
}

/// Attempts for the completion patch when a payment was captured. A
/// successful capture must never be dropped because one write failed.
const CAPTURE_PATCH_ATTEMPTS: u32 = 3;

pub struct ProfileFinalizer {
    store: Arc<dyn Store>,
}

impl ProfileFinalizer {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Commit the terminal state for `account` per `decision`.
    ///
    /// Re-invoking on a completed account returns immediately — no
    /// duplicate role record, no double-charge.
    pub async fn finalize(
        &self,
        account: &mut Account,
        decision: &Decision,
    ) -> Result<FinalizeOutcome, OnboardingError> {
        if account.onboarding_completed {
            return Ok(FinalizeOutcome::AlreadyCompleted);
        }

        let patch = AccountPatch {
            onboarding_completed: Some(true),
            onboarding_step: Some(OnboardingStep::Complete),
            subscription: Some(subscription_from(decision)),
            // Consume the entry lock so later app loads never re-lock.
            role_locked: Some(false),
            ..Default::default()
        };
        self.commit_patch(account, &patch, decision).await?;
        patch.apply_to(account);

        let role_record = if account.role == Role::Student {
            RoleRecordOutcome::NotApplicable
        } else {
            self.promote_role_record(account).await
        };

        tracing::info!(
            subject_id = %account.subject_id,
            role = %account.role,
            subscription = ?account.subscription.status,
            role_record = ?role_record,
            "Onboarding finalized"
        );
        Ok(FinalizeOutcome::Completed { role_record })
    }

    /// Write the completion patch. Capture-success decisions retry before
    /// giving up: capture and account patch are one logical unit.
    async fn commit_patch(
        &self,
        account: &Account,
        patch: &AccountPatch,
        decision: &Decision,
    ) -> Result<(), OnboardingError> {
        let attempts = if decision.is_active() {
            CAPTURE_PATCH_ATTEMPTS
        } else {
            1
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.store.patch_account(&account.subject_id, patch).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < attempts => {
                    tracing::warn!(
                        subject_id = %account.subject_id,
                        attempt,
                        error = %e,
                        "Finalize patch failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(100 * u64::from(attempt))).await;
                }
                Err(e) => {
                    if decision.is_active() {
                        tracing::error!(
                            subject_id = %account.subject_id,
                            error = %e,
                            "Captured payment not yet recorded on account; caller must retry finalize"
                        );
                    }
                    return Err(OnboardingError::Store(e));
                }
            }
        }
    }

    /// Promote the staged draft into the role collection, at most once.
    ///
    /// Failures here are non-fatal to the user-visible flow: the account
    /// stays complete and the miss is logged for reconciliation.
    async fn promote_role_record(&self, account: &Account) -> RoleRecordOutcome {
        match self
            .store
            .find_role_record(account.role, &account.subject_id)
            .await
        {
            Ok(Some(_)) => return RoleRecordOutcome::AlreadyExists,
            Ok(None) => {}
            Err(e) => {
                tracing::error!(
                    subject_id = %account.subject_id,
                    role = %account.role,
                    error = %e,
                    "Role record lookup failed during finalization"
                );
                return RoleRecordOutcome::Failed;
            }
        }

        let draft = match &account.role_profile_draft {
            Some(draft) if draft.role() == account.role => draft,
            Some(draft) => {
                tracing::error!(
                    subject_id = %account.subject_id,
                    account_role = %account.role,
                    draft_role = %draft.role(),
                    "Staged draft does not match account role; record not created"
                );
                return RoleRecordOutcome::Failed;
            }
            None => {
                tracing::error!(
                    subject_id = %account.subject_id,
                    role = %account.role,
                    "No staged draft at finalization; record not created"
                );
                return RoleRecordOutcome::Failed;
            }
        };

        let record = RoleRecord::from_draft(&account.subject_id, draft);
        match self.store.create_role_record(&record).await {
            Ok(()) => RoleRecordOutcome::Created,
            // A racing session won the insert; the invariant holds.
            Err(StoreError::Constraint(_)) => RoleRecordOutcome::AlreadyExists,
            Err(e) => {
                tracing::error!(
                    subject_id = %account.subject_id,
                    role = %account.role,
                    error = %e,
                    "Role record creation failed; account left complete for reconciliation"
                );
                RoleRecordOutcome::Failed
            }
        }
    }
}

/// Subscription fields for the account, per the finalize decision.
fn subscription_from(decision: &Decision) -> Subscription {
    match decision {
        Decision::Active {
            plan,
            amount,
            currency,
            order_id,
            captured_at,
            ..
        } => Subscription {
            active: true,
            status: SubscriptionStatus::Active,
            plan: Some(plan.clone()),
            amount: Some(*amount),
            currency: Some(currency.clone()),
            provider_order_id: Some(order_id.clone()),
            captured_at: Some(*captured_at),
        },
        Decision::Skipped => Subscription {
            active: false,
            status: SubscriptionStatus::Skipped,
            ..Default::default()
        },
    }
}
