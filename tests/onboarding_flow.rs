//! End-to-end onboarding scenarios against the in-memory store with a
//! stub payment provider — no network, no database file.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal_macros::dec;

use edumarket::account::{RoleRecord, SubscriptionStatus, VerificationStatus};
use edumarket::error::{OnboardingError, PaymentError};
use edumarket::onboarding::{
    FinalizeOutcome, Identity, OnboardingEvent, OnboardingMachine, OnboardingStep,
    RoleRecordOutcome, SessionContext,
};
use edumarket::payment::{Capture, CreateOrder, PaymentProvider};
use edumarket::roles::{AgentDraft, BasicInfo, Role, RoleProfileDraft, TutorDraft};
use edumarket::store::{MemoryStore, Store};

/// Payment provider stub: always approves, counts captures.
struct StubProvider {
    captures: AtomicUsize,
    fail_capture: bool,
}

impl StubProvider {
    fn new() -> Self {
        Self {
            captures: AtomicUsize::new(0),
            fail_capture: false,
        }
    }

    fn failing() -> Self {
        Self {
            captures: AtomicUsize::new(0),
            fail_capture: true,
        }
    }
}

#[async_trait]
impl PaymentProvider for StubProvider {
    async fn create_order(&self, _order: &CreateOrder) -> Result<String, PaymentError> {
        Ok("ORDER123".to_string())
    }

    async fn capture_order(&self, order_id: &str) -> Result<Capture, PaymentError> {
        if self.fail_capture {
            return Err(PaymentError::Capture {
                order_id: order_id.to_string(),
                reason: "declined".to_string(),
            });
        }
        self.captures.fetch_add(1, Ordering::SeqCst);
        Ok(Capture {
            transaction_id: format!("TXN-{order_id}"),
            payer_email: Some("payer@example.com".to_string()),
            captured_at: Utc::now(),
        })
    }
}

fn identity(subject: &str) -> Identity {
    Identity {
        subject_id: subject.to_string(),
        email: format!("{subject}@example.com"),
        display_name: Some("Jane Doe".to_string()),
    }
}

fn jane_basic_info() -> BasicInfo {
    BasicInfo {
        full_name: "Jane Doe".to_string(),
        phone: "+15550000".to_string(),
        country: "Canada".to_string(),
        country_code: Some("CA".to_string()),
    }
}

fn agent_draft() -> RoleProfileDraft {
    RoleProfileDraft::Agent(AgentDraft {
        company_name: "Globe Study".to_string(),
        business_license: "BL-2291".to_string(),
        payout_email: "pay@globestudy.example".to_string(),
    })
}

fn tutor_draft() -> RoleProfileDraft {
    RoleProfileDraft::Tutor(TutorDraft {
        specializations: vec!["math".to_string()],
        experience_years: 5,
        hourly_rate: dec!(40),
        payout_email: "tutor@example.com".to_string(),
        bio: None,
    })
}

#[tokio::test]
async fn agent_deep_link_flow_with_skip() {
    let store = Arc::new(MemoryStore::new());

    // Deep link `role=agent&lock=1`: lands on BasicInfo with the role pinned.
    let mut machine = OnboardingMachine::start(
        Arc::clone(&store) as Arc<dyn Store>,
        None,
        &identity("agent_1"),
        SessionContext::from_query("role=agent&lock=1"),
    )
    .await
    .unwrap();
    assert_eq!(machine.current_step(), OnboardingStep::BasicInfo);
    assert_eq!(machine.account().role, Role::Agent);
    assert!(machine.account().role_locked);

    let transition = machine
        .dispatch(OnboardingEvent::SubmitBasicInfo(jane_basic_info()))
        .await
        .unwrap();
    assert_eq!(transition.step, OnboardingStep::RoleSpecific);

    let transition = machine
        .dispatch(OnboardingEvent::SubmitRoleDetails(agent_draft()))
        .await
        .unwrap();
    assert_eq!(transition.step, OnboardingStep::Subscription);

    let transition = machine
        .dispatch(OnboardingEvent::SkipSubscription)
        .await
        .unwrap();
    assert_eq!(transition.step, OnboardingStep::Complete);
    assert_eq!(
        transition.finalize,
        Some(FinalizeOutcome::Completed {
            role_record: RoleRecordOutcome::Created
        })
    );

    let account = store.get_account("agent_1").await.unwrap();
    assert!(account.onboarding_completed);
    assert_eq!(account.subscription.status, SubscriptionStatus::Skipped);
    assert!(!account.subscription.active);
    assert_eq!(account.full_name, "Jane Doe");

    // Exactly one agent record, pending verification, with a referral code.
    assert_eq!(
        store.count_role_records(Role::Agent, "agent_1").await.unwrap(),
        1
    );
    let record = store
        .find_role_record(Role::Agent, "agent_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.verification_status(), VerificationStatus::Pending);
    match record {
        RoleRecord::Agent(agent) => {
            assert_eq!(agent.company_name, "Globe Study");
            assert!(agent.referral_code.starts_with("AGT-"));
        }
        other => panic!("expected agent record, got {other:?}"),
    }
}

#[tokio::test]
async fn payment_capture_success_records_order() {
    let store = Arc::new(MemoryStore::new());
    let provider = Arc::new(StubProvider::new());

    let mut machine = OnboardingMachine::start(
        Arc::clone(&store) as Arc<dyn Store>,
        Some(Arc::clone(&provider) as Arc<dyn PaymentProvider>),
        &identity("tutor_1"),
        SessionContext::from_query("role=tutor&lock=1"),
    )
    .await
    .unwrap();

    machine
        .dispatch(OnboardingEvent::SubmitBasicInfo(jane_basic_info()))
        .await
        .unwrap();
    machine
        .dispatch(OnboardingEvent::SubmitRoleDetails(tutor_draft()))
        .await
        .unwrap();

    let transition = machine
        .dispatch(OnboardingEvent::ApproveSubscription {
            order_id: "ORDER123".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(transition.step, OnboardingStep::Complete);

    let account = store.get_account("tutor_1").await.unwrap();
    assert!(account.subscription.active);
    assert_eq!(account.subscription.status, SubscriptionStatus::Active);
    assert_eq!(
        account.subscription.provider_order_id.as_deref(),
        Some("ORDER123")
    );
    assert_eq!(account.subscription.amount, Some(dec!(29.99)));
    assert!(account.subscription.captured_at.is_some());
    assert_eq!(
        store.count_role_records(Role::Tutor, "tutor_1").await.unwrap(),
        1
    );
}

#[tokio::test]
async fn capture_failure_stays_on_subscription_and_skip_escapes() {
    let store = Arc::new(MemoryStore::new());
    let provider = Arc::new(StubProvider::failing());

    let mut machine = OnboardingMachine::start(
        Arc::clone(&store) as Arc<dyn Store>,
        Some(Arc::clone(&provider) as Arc<dyn PaymentProvider>),
        &identity("tutor_2"),
        SessionContext::from_query("role=tutor&lock=1"),
    )
    .await
    .unwrap();
    machine
        .dispatch(OnboardingEvent::SubmitBasicInfo(jane_basic_info()))
        .await
        .unwrap();
    machine
        .dispatch(OnboardingEvent::SubmitRoleDetails(tutor_draft()))
        .await
        .unwrap();

    let err = machine
        .dispatch(OnboardingEvent::ApproveSubscription {
            order_id: "ORDER123".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OnboardingError::Payment(PaymentError::Capture { .. })
    ));
    // Still on Subscription, nothing finalized.
    assert_eq!(machine.current_step(), OnboardingStep::Subscription);
    let account = store.get_account("tutor_2").await.unwrap();
    assert!(!account.onboarding_completed);
    assert_eq!(account.subscription.status, SubscriptionStatus::None);

    // Skip remains available as the escape hatch.
    let transition = machine
        .dispatch(OnboardingEvent::SkipSubscription)
        .await
        .unwrap();
    assert_eq!(transition.step, OnboardingStep::Complete);
    let account = store.get_account("tutor_2").await.unwrap();
    assert_eq!(account.subscription.status, SubscriptionStatus::Skipped);
}

#[tokio::test]
async fn duplicate_approve_never_double_charges() {
    let store = Arc::new(MemoryStore::new());
    let provider = Arc::new(StubProvider::new());

    let mut machine = OnboardingMachine::start(
        Arc::clone(&store) as Arc<dyn Store>,
        Some(Arc::clone(&provider) as Arc<dyn PaymentProvider>),
        &identity("vendor_1"),
        SessionContext::from_query("role=vendor&lock=1"),
    )
    .await
    .unwrap();
    machine
        .dispatch(OnboardingEvent::SubmitBasicInfo(jane_basic_info()))
        .await
        .unwrap();
    machine
        .dispatch(OnboardingEvent::SubmitRoleDetails(RoleProfileDraft::Vendor(
            edumarket::roles::VendorDraft {
                business_name: "EduSupplies".to_string(),
                service_categories: vec!["books".to_string()],
                payout_email: "pay@edusupplies.example".to_string(),
            },
        )))
        .await
        .unwrap();

    let first = machine
        .dispatch(OnboardingEvent::ApproveSubscription {
            order_id: "ORDER123".to_string(),
        })
        .await
        .unwrap();
    assert!(matches!(
        first.finalize,
        Some(FinalizeOutcome::Completed { .. })
    ));

    // The widget fired its approve callback again.
    let second = machine
        .dispatch(OnboardingEvent::ApproveSubscription {
            order_id: "ORDER123".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(second.finalize, Some(FinalizeOutcome::AlreadyCompleted));

    // One capture, one role record.
    assert_eq!(provider.captures.load(Ordering::SeqCst), 1);
    assert_eq!(
        store
            .count_role_records(Role::Vendor, "vendor_1")
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn student_flow_never_sees_subscription() {
    let store = Arc::new(MemoryStore::new());
    let mut machine = OnboardingMachine::start(
        Arc::clone(&store) as Arc<dyn Store>,
        None,
        &identity("student_1"),
        SessionContext::empty(),
    )
    .await
    .unwrap();

    machine
        .dispatch(OnboardingEvent::SelectRole(Role::Student))
        .await
        .unwrap();
    let transition = machine
        .dispatch(OnboardingEvent::SubmitBasicInfo(jane_basic_info()))
        .await
        .unwrap();
    assert_eq!(transition.step, OnboardingStep::Complete);
    assert_eq!(
        transition.finalize,
        Some(FinalizeOutcome::Completed {
            role_record: RoleRecordOutcome::NotApplicable
        })
    );

    let account = store.get_account("student_1").await.unwrap();
    assert!(account.onboarding_completed);
    assert_eq!(account.subscription.status, SubscriptionStatus::Skipped);
    for role in [Role::Agent, Role::Tutor, Role::School, Role::Vendor] {
        assert_eq!(
            store.count_role_records(role, "student_1").await.unwrap(),
            0
        );
    }
}

#[tokio::test]
async fn reload_mid_flow_resumes_with_fields_intact() {
    let store = Arc::new(MemoryStore::new());
    {
        let mut machine = OnboardingMachine::start(
            Arc::clone(&store) as Arc<dyn Store>,
            None,
            &identity("school_1"),
            SessionContext::from_query("role=school&lock=1"),
        )
        .await
        .unwrap();
        machine
            .dispatch(OnboardingEvent::SubmitBasicInfo(jane_basic_info()))
            .await
            .unwrap();
        assert_eq!(machine.current_step(), OnboardingStep::RoleSpecific);
    }

    // Fresh session without a hint — e.g. a plain reload.
    let machine = OnboardingMachine::start(
        Arc::clone(&store) as Arc<dyn Store>,
        None,
        &identity("school_1"),
        SessionContext::empty(),
    )
    .await
    .unwrap();
    assert_eq!(machine.current_step(), OnboardingStep::RoleSpecific);
    assert_eq!(machine.account().full_name, "Jane Doe");
    assert_eq!(machine.account().phone, "+15550000");
    assert_eq!(machine.account().role, Role::School);
}

#[tokio::test]
async fn completed_account_is_not_relocked_by_stale_deep_link() {
    let store = Arc::new(MemoryStore::new());
    {
        let mut machine = OnboardingMachine::start(
            Arc::clone(&store) as Arc<dyn Store>,
            None,
            &identity("agent_2"),
            SessionContext::from_query("role=agent&lock=1"),
        )
        .await
        .unwrap();
        machine
            .dispatch(OnboardingEvent::SubmitBasicInfo(jane_basic_info()))
            .await
            .unwrap();
        machine
            .dispatch(OnboardingEvent::SubmitRoleDetails(agent_draft()))
            .await
            .unwrap();
        machine
            .dispatch(OnboardingEvent::SkipSubscription)
            .await
            .unwrap();
    }

    // The user revisits through the same deep link after finishing.
    let machine = OnboardingMachine::start(
        Arc::clone(&store) as Arc<dyn Store>,
        None,
        &identity("agent_2"),
        SessionContext::from_query("role=agent&lock=1"),
    )
    .await
    .unwrap();
    assert!(machine.account().onboarding_completed);
    assert!(!machine.account().role_locked);
    assert_eq!(machine.current_step(), OnboardingStep::Complete);
}
