//! Onboarding state machine — entry resolution, transitions, and gating.
//!
//! One machine per session. Transitions are driven by explicit user
//! events; there are no timers. Every transition persists the new cursor
//! before the in-memory step updates, so a reload mid-flow resumes at the
//! last persisted step, never an optimistic one.

use std::sync::Arc;

use serde::Serialize;

use crate::account::{Account, AccountPatch, SubscriptionStatus};
use crate::error::{OnboardingError, StoreError};
use crate::payment::{PaymentProvider, SubscriptionGateway};
use crate::roles::{BasicInfo, Pricing, Role, RoleProfileDraft, validate_basic_info, validate_draft};
use crate::store::Store;

use super::finalizer::{FinalizeOutcome, ProfileFinalizer};
use super::session::{Identity, SessionContext};
use super::step::OnboardingStep;

/// User-driven events accepted by the machine.
#[derive(Debug, Clone)]
pub enum OnboardingEvent {
    SelectRole(Role),
    SubmitBasicInfo(BasicInfo),
    SubmitRoleDetails(RoleProfileDraft),
    /// The payment widget approved an order; capture it and finalize.
    ApproveSubscription { order_id: String },
    SkipSubscription,
    Back,
}

impl OnboardingEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::SelectRole(_) => "select_role",
            Self::SubmitBasicInfo(_) => "submit_basic_info",
            Self::SubmitRoleDetails(_) => "submit_role_details",
            Self::ApproveSubscription { .. } => "approve_subscription",
            Self::SkipSubscription => "skip_subscription",
            Self::Back => "back",
        }
    }
}

/// Result of a dispatched event: the (persisted) step afterwards, plus the
/// finalize outcome when the event was terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub step: OnboardingStep,
    pub finalize: Option<FinalizeOutcome>,
}

impl Transition {
    fn to(step: OnboardingStep) -> Self {
        Self {
            step,
            finalize: None,
        }
    }
}

/// Snapshot of the flow, served by the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct OnboardingStatus {
    pub subject_id: String,
    pub role: Role,
    pub role_locked: bool,
    pub step: OnboardingStep,
    pub onboarding_completed: bool,
    pub subscription_status: SubscriptionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<Pricing>,
}

/// Drives one account through the onboarding flow.
pub struct OnboardingMachine {
    store: Arc<dyn Store>,
    payments: Option<Arc<dyn PaymentProvider>>,
    finalizer: ProfileFinalizer,
    account: Account,
}

impl OnboardingMachine {
    /// Start a session: load or bootstrap the account, then run entry
    /// resolution once against the session context.
    pub async fn start(
        store: Arc<dyn Store>,
        payments: Option<Arc<dyn PaymentProvider>>,
        identity: &Identity,
        session: SessionContext,
    ) -> Result<Self, OnboardingError> {
        let account = match store.load_account(&identity.subject_id).await? {
            Some(account) => account,
            None => {
                let account = Account::bootstrap(
                    &identity.subject_id,
                    &identity.email,
                    identity.display_name.as_deref(),
                    session.entry_hint.map(|h| h.role),
                );
                match store.create_account(&account).await {
                    Ok(()) => account,
                    // Another tab won the create; use its document.
                    Err(StoreError::Constraint(_)) => {
                        store.get_account(&identity.subject_id).await?
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        let mut machine = Self {
            finalizer: ProfileFinalizer::new(Arc::clone(&store)),
            store,
            payments,
            account,
        };
        machine.resolve_entry(session).await?;
        Ok(machine)
    }

    /// Resume a session for an existing account, with no entry hint.
    pub async fn resume(
        store: Arc<dyn Store>,
        payments: Option<Arc<dyn PaymentProvider>>,
        subject_id: &str,
    ) -> Result<Self, OnboardingError> {
        let account = store.get_account(subject_id).await?;
        Ok(Self {
            finalizer: ProfileFinalizer::new(Arc::clone(&store)),
            store,
            payments,
            account,
        })
    }

    /// Entry resolution, run once per session.
    ///
    /// A present hint pins the resolved role and, if the stored cursor is
    /// still ChooseRole, advances it to BasicInfo without a user click.
    /// The hint is consumed here and never re-read mid-flow.
    async fn resolve_entry(&mut self, session: SessionContext) -> Result<(), OnboardingError> {
        let Some(hint) = session.entry_hint else {
            return Ok(());
        };
        // A finished account is never re-locked by a stale deep link.
        if self.account.onboarding_completed {
            return Ok(());
        }

        let mut patch = AccountPatch {
            role_locked: Some(hint.lock),
            ..Default::default()
        };
        if self.account.role != hint.role {
            patch.role = Some(hint.role);
            // Drop fields staged for the previous role.
            if self.account.role_profile_draft.is_some() {
                patch.role_profile_draft = Some(None);
            }
        }
        if self.account.onboarding_step == OnboardingStep::ChooseRole {
            patch.onboarding_step = Some(OnboardingStep::BasicInfo);
        } else if !self.account.onboarding_step.is_valid_for(hint.role) {
            // The stored cursor belongs to the previous role's sequence.
            patch.onboarding_step = Some(OnboardingStep::BasicInfo);
        }

        self.apply(patch).await?;
        tracing::debug!(
            subject_id = %self.account.subject_id,
            role = %self.account.role,
            locked = self.account.role_locked,
            step = %self.account.onboarding_step,
            "Entry resolved"
        );
        Ok(())
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn current_step(&self) -> OnboardingStep {
        self.account.onboarding_step
    }

    /// Gateway for the current role's Subscription step, if it has one.
    pub fn subscription_gateway(&self) -> Option<SubscriptionGateway> {
        SubscriptionGateway::for_role(self.account.role, self.payments.clone())
    }

    pub fn status(&self) -> OnboardingStatus {
        OnboardingStatus {
            subject_id: self.account.subject_id.clone(),
            role: self.account.role,
            role_locked: self.account.role_locked,
            step: self.account.onboarding_step,
            onboarding_completed: self.account.onboarding_completed,
            subscription_status: self.account.subscription.status,
            pricing: self.account.role.pricing(),
        }
    }

    /// Dispatch a user event against the current step.
    pub async fn dispatch(&mut self, event: OnboardingEvent) -> Result<Transition, OnboardingError> {
        if self.account.onboarding_completed {
            // Terminal events tolerate at-least-once delivery (duplicate
            // approve callbacks, double-clicked skip); anything else on a
            // finished account is a stale session.
            return match event {
                OnboardingEvent::ApproveSubscription { .. } | OnboardingEvent::SkipSubscription => {
                    Ok(Transition {
                        step: OnboardingStep::Complete,
                        finalize: Some(FinalizeOutcome::AlreadyCompleted),
                    })
                }
                _ => Err(OnboardingError::AlreadyCompleted),
            };
        }

        match event {
            OnboardingEvent::SelectRole(role) => self.select_role(role).await,
            OnboardingEvent::SubmitBasicInfo(info) => self.submit_basic_info(info).await,
            OnboardingEvent::SubmitRoleDetails(draft) => self.submit_role_details(draft).await,
            OnboardingEvent::ApproveSubscription { order_id } => {
                self.approve_subscription(&order_id).await
            }
            OnboardingEvent::SkipSubscription => self.skip_subscription().await,
            OnboardingEvent::Back => self.back().await,
        }
    }

    async fn select_role(&mut self, role: Role) -> Result<Transition, OnboardingError> {
        self.require_step(OnboardingStep::ChooseRole, "select_role")?;
        if self.account.role_locked {
            return Err(OnboardingError::RoleLocked);
        }

        let mut patch = AccountPatch {
            role: Some(role),
            onboarding_step: Some(OnboardingStep::BasicInfo),
            ..Default::default()
        };
        // Switching roles drops the old role's staged fields so they never
        // leak into the new role's record.
        if role != self.account.role && self.account.role_profile_draft.is_some() {
            patch.role_profile_draft = Some(None);
        }
        self.apply(patch).await?;
        Ok(Transition::to(OnboardingStep::BasicInfo))
    }

    async fn submit_basic_info(&mut self, info: BasicInfo) -> Result<Transition, OnboardingError> {
        self.require_step(OnboardingStep::BasicInfo, "submit_basic_info")?;
        validate_basic_info(&info)?;

        let mut patch = AccountPatch {
            full_name: Some(info.full_name),
            phone: Some(info.phone),
            country: Some(info.country),
            country_code: info.country_code,
            ..Default::default()
        };

        if self.account.role == Role::Student {
            // Students have no role-specific or subscription steps: persist
            // the fields, then finalize directly with a skipped decision.
            self.apply(patch).await?;
            let outcome = self
                .finalizer
                .finalize(&mut self.account, &crate::payment::Decision::Skipped)
                .await?;
            return Ok(Transition {
                step: OnboardingStep::Complete,
                finalize: Some(outcome),
            });
        }

        patch.onboarding_step = Some(OnboardingStep::RoleSpecific);
        self.apply(patch).await?;
        Ok(Transition::to(OnboardingStep::RoleSpecific))
    }

    async fn submit_role_details(
        &mut self,
        draft: RoleProfileDraft,
    ) -> Result<Transition, OnboardingError> {
        self.require_step(OnboardingStep::RoleSpecific, "submit_role_details")?;
        if draft.role() != self.account.role {
            return Err(OnboardingError::DraftRoleMismatch {
                submitted: draft.role().to_string(),
                account: self.account.role.to_string(),
            });
        }
        validate_draft(&draft)?;

        let patch = AccountPatch {
            role_profile_draft: Some(Some(draft)),
            onboarding_step: Some(OnboardingStep::Subscription),
            ..Default::default()
        };
        self.apply(patch).await?;
        Ok(Transition::to(OnboardingStep::Subscription))
    }

    async fn approve_subscription(&mut self, order_id: &str) -> Result<Transition, OnboardingError> {
        self.require_step(OnboardingStep::Subscription, "approve_subscription")?;
        let mut gateway =
            self.subscription_gateway()
                .ok_or_else(|| OnboardingError::InvalidTransition {
                    step: self.account.onboarding_step.to_string(),
                    event: "approve_subscription".to_string(),
                })?;

        let decision = gateway.on_approve(order_id).await?;
        let outcome = self.finalizer.finalize(&mut self.account, &decision).await?;
        Ok(Transition {
            step: OnboardingStep::Complete,
            finalize: Some(outcome),
        })
    }

    async fn skip_subscription(&mut self) -> Result<Transition, OnboardingError> {
        self.require_step(OnboardingStep::Subscription, "skip_subscription")?;
        let outcome = self
            .finalizer
            .finalize(&mut self.account, &crate::payment::Decision::Skipped)
            .await?;
        Ok(Transition {
            step: OnboardingStep::Complete,
            finalize: Some(outcome),
        })
    }

    async fn back(&mut self) -> Result<Transition, OnboardingError> {
        let current = self.account.onboarding_step;

        // Locked accounts never return to role selection; Back from
        // BasicInfo is a no-op rather than an error.
        if current == OnboardingStep::BasicInfo && self.account.role_locked {
            return Ok(Transition::to(current));
        }

        let Some(previous) = current.back_for(self.account.role) else {
            return Ok(Transition::to(current));
        };

        self.apply(AccountPatch {
            onboarding_step: Some(previous),
            ..Default::default()
        })
        .await?;
        Ok(Transition::to(previous))
    }

    fn require_step(
        &self,
        expected: OnboardingStep,
        event: &str,
    ) -> Result<(), OnboardingError> {
        if self.account.onboarding_step != expected {
            return Err(OnboardingError::InvalidTransition {
                step: self.account.onboarding_step.to_string(),
                event: event.to_string(),
            });
        }
        Ok(())
    }

    /// Persist a patch, then mirror it onto the in-memory account.
    ///
    /// Order matters: on a failed write the visible step stays where it
    /// was, and the caller sees a retryable error.
    async fn apply(&mut self, patch: AccountPatch) -> Result<(), OnboardingError> {
        if patch.is_empty() {
            return Ok(());
        }
        self.store
            .patch_account(&self.account.subject_id, &patch)
            .await?;
        patch.apply_to(&mut self.account);
        Ok(())
    }
}
