//! Integration tests for the onboarding REST API.
//!
//! Each test spins up an Axum server on a random port backed by the
//! in-memory store and exercises the real HTTP contract with reqwest.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use edumarket::onboarding::{OnboardingRouteState, onboarding_routes};
use edumarket::store::{MemoryStore, Store};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Start the API on a random port, return its base URL.
async fn start_server() -> String {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let app = onboarding_routes(OnboardingRouteState {
        store,
        payments: None,
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://127.0.0.1:{port}")
}

async fn post_json(client: &reqwest::Client, url: &str, body: Value) -> (u16, Value) {
    let response = client.post(url).json(&body).send().await.unwrap();
    let status = response.status().as_u16();
    let body: Value = response.json().await.unwrap();
    (status, body)
}

#[tokio::test]
async fn deep_linked_agent_completes_over_http() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();

        // Start with a locked agent hint.
        let (status, body) = post_json(
            &client,
            &format!("{base}/api/onboarding/agent_1/start"),
            json!({"email": "jane@example.com", "role": "agent", "lock": true}),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["step"], "basic_info");
        assert_eq!(body["role"], "agent");
        assert_eq!(body["role_locked"], true);

        let (status, body) = post_json(
            &client,
            &format!("{base}/api/onboarding/agent_1/basic-info"),
            json!({"full_name": "Jane Doe", "phone": "+15550000", "country": "Canada"}),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["step"], "role_specific");

        let (status, body) = post_json(
            &client,
            &format!("{base}/api/onboarding/agent_1/role-details"),
            json!({
                "role": "agent",
                "company_name": "Globe Study",
                "business_license": "BL-2291",
                "payout_email": "pay@globestudy.example"
            }),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["step"], "subscription");

        let (status, body) = post_json(
            &client,
            &format!("{base}/api/onboarding/agent_1/subscription/skip"),
            json!({}),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["step"], "complete");

        // Status reflects the finalized account.
        let status_body: Value = client
            .get(format!("{base}/api/onboarding/agent_1/status"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status_body["onboarding_completed"], true);
        assert_eq!(status_body["subscription_status"], "skipped");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn validation_errors_are_unprocessable() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();

        post_json(
            &client,
            &format!("{base}/api/onboarding/t_1/start"),
            json!({"email": "t@example.com", "role": "tutor"}),
        )
        .await;

        let (status, body) = post_json(
            &client,
            &format!("{base}/api/onboarding/t_1/basic-info"),
            json!({"full_name": "", "phone": "+15550000", "country": "Canada"}),
        )
        .await;
        assert_eq!(status, 422);
        assert_eq!(body["kind"], "validation");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn locked_role_selection_conflicts() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();

        post_json(
            &client,
            &format!("{base}/api/onboarding/a_1/start"),
            json!({"email": "a@example.com", "role": "agent", "lock": true}),
        )
        .await;

        // The cursor moved to basic_info, so a role-selection POST is a
        // stale request either way; it must not change anything.
        let (status, body) = post_json(
            &client,
            &format!("{base}/api/onboarding/a_1/role"),
            json!({"role": "tutor"}),
        )
        .await;
        assert_eq!(status, 409);
        assert_eq!(body["kind"], "conflict");

        let status_body: Value = client
            .get(format!("{base}/api/onboarding/a_1/status"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status_body["role"], "agent");
        assert_eq!(status_body["step"], "basic_info");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn unknown_subject_is_not_found() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();

        let response = client
            .get(format!("{base}/api/onboarding/ghost/status"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 404);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn back_from_basic_info_is_noop_when_locked() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();

        post_json(
            &client,
            &format!("{base}/api/onboarding/s_1/start"),
            json!({"email": "s@example.com", "role": "school", "lock": true}),
        )
        .await;

        let (status, body) = post_json(
            &client,
            &format!("{base}/api/onboarding/s_1/back"),
            json!({}),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["step"], "basic_info");
    })
    .await
    .unwrap();
}
