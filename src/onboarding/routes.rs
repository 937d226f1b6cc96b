//! REST endpoints for the onboarding flow.
//!
//! Each request builds a machine from the persisted account, dispatches
//! one event, and returns the resulting (persisted) step. The entry hint
//! only appears on the start endpoint — everything else resumes from the
//! stored cursor.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::{OnboardingError, StoreError};
use crate::payment::PaymentProvider;
use crate::roles::{BasicInfo, Role, RoleProfileDraft};
use crate::store::Store;

use super::machine::{OnboardingEvent, OnboardingMachine};
use super::session::{Identity, SessionContext};

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub store: Arc<dyn Store>,
    pub payments: Option<Arc<dyn PaymentProvider>>,
}

#[derive(Debug, Deserialize)]
struct StartRequest {
    email: String,
    #[serde(default)]
    display_name: Option<String>,
    /// Entry hint: deep-link role token, optionally with a lock flag.
    #[serde(default)]
    role: Option<Role>,
    #[serde(default)]
    lock: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct SelectRoleRequest {
    role: Role,
}

#[derive(Debug, Deserialize)]
struct ApproveRequest {
    order_id: String,
}

fn error_response(err: OnboardingError) -> Response {
    let (status, kind) = match &err {
        OnboardingError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation"),
        OnboardingError::Store(StoreError::NotFound { .. }) => (StatusCode::NOT_FOUND, "not_found"),
        OnboardingError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store"),
        OnboardingError::Payment(_) => (StatusCode::BAD_GATEWAY, "payment"),
        OnboardingError::RoleLocked
        | OnboardingError::InvalidTransition { .. }
        | OnboardingError::DraftRoleMismatch { .. }
        | OnboardingError::AlreadyCompleted => (StatusCode::CONFLICT, "conflict"),
    };
    (
        status,
        Json(serde_json::json!({"error": err.to_string(), "kind": kind})),
    )
        .into_response()
}

async fn resume(state: &OnboardingRouteState, subject: &str) -> Result<OnboardingMachine, Response> {
    OnboardingMachine::resume(Arc::clone(&state.store), state.payments.clone(), subject)
        .await
        .map_err(error_response)
}

async fn dispatch(
    state: OnboardingRouteState,
    subject: String,
    event: OnboardingEvent,
) -> Response {
    let mut machine = match resume(&state, &subject).await {
        Ok(machine) => machine,
        Err(response) => return response,
    };
    match machine.dispatch(event).await {
        Ok(transition) => Json(transition).into_response(),
        Err(err) => error_response(err),
    }
}

/// GET /api/onboarding/{subject}/status
async fn get_status(
    State(state): State<OnboardingRouteState>,
    Path(subject): Path<String>,
) -> Response {
    match resume(&state, &subject).await {
        Ok(machine) => Json(machine.status()).into_response(),
        Err(response) => response,
    }
}

/// POST /api/onboarding/{subject}/start
///
/// Runs entry resolution: creates the account if needed and applies the
/// deep-link role hint, then returns the resolved status.
async fn start_session(
    State(state): State<OnboardingRouteState>,
    Path(subject): Path<String>,
    Json(request): Json<StartRequest>,
) -> Response {
    let identity = Identity {
        subject_id: subject,
        email: request.email,
        display_name: request.display_name,
    };
    let session = match request.role {
        Some(role) => SessionContext::with_hint(role, request.lock.unwrap_or(true)),
        None => SessionContext::empty(),
    };
    match OnboardingMachine::start(
        Arc::clone(&state.store),
        state.payments.clone(),
        &identity,
        session,
    )
    .await
    {
        Ok(machine) => Json(machine.status()).into_response(),
        Err(err) => error_response(err),
    }
}

/// POST /api/onboarding/{subject}/role
async fn select_role(
    State(state): State<OnboardingRouteState>,
    Path(subject): Path<String>,
    Json(request): Json<SelectRoleRequest>,
) -> Response {
    dispatch(state, subject, OnboardingEvent::SelectRole(request.role)).await
}

/// POST /api/onboarding/{subject}/basic-info
async fn submit_basic_info(
    State(state): State<OnboardingRouteState>,
    Path(subject): Path<String>,
    Json(info): Json<BasicInfo>,
) -> Response {
    dispatch(state, subject, OnboardingEvent::SubmitBasicInfo(info)).await
}

/// POST /api/onboarding/{subject}/role-details
async fn submit_role_details(
    State(state): State<OnboardingRouteState>,
    Path(subject): Path<String>,
    Json(draft): Json<RoleProfileDraft>,
) -> Response {
    dispatch(state, subject, OnboardingEvent::SubmitRoleDetails(draft)).await
}

/// POST /api/onboarding/{subject}/subscription/approve
async fn approve_subscription(
    State(state): State<OnboardingRouteState>,
    Path(subject): Path<String>,
    Json(request): Json<ApproveRequest>,
) -> Response {
    dispatch(
        state,
        subject,
        OnboardingEvent::ApproveSubscription {
            order_id: request.order_id,
        },
    )
    .await
}

/// POST /api/onboarding/{subject}/subscription/skip
async fn skip_subscription(
    State(state): State<OnboardingRouteState>,
    Path(subject): Path<String>,
) -> Response {
    dispatch(state, subject, OnboardingEvent::SkipSubscription).await
}

/// POST /api/onboarding/{subject}/back
async fn go_back(
    State(state): State<OnboardingRouteState>,
    Path(subject): Path<String>,
) -> Response {
    dispatch(state, subject, OnboardingEvent::Back).await
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/api/onboarding/{subject}/status", get(get_status))
        .route("/api/onboarding/{subject}/start", post(start_session))
        .route("/api/onboarding/{subject}/role", post(select_role))
        .route("/api/onboarding/{subject}/basic-info", post(submit_basic_info))
        .route(
            "/api/onboarding/{subject}/role-details",
            post(submit_role_details),
        )
        .route(
            "/api/onboarding/{subject}/subscription/approve",
            post(approve_subscription),
        )
        .route(
            "/api/onboarding/{subject}/subscription/skip",
            post(skip_subscription),
        )
        .route("/api/onboarding/{subject}/back", post(go_back))
        .with_state(state)
}
