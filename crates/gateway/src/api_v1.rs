//! HTTP API v1.
//!
//! Endpoints (all require a bearer token):
//!
//! - `POST /api/v1/ai/suggest-action` : Suggest an action for one email
//! - `GET  /api/v1/user/status`       : Subscription and usage summary
//! - `POST /api/v1/accounts/add`      : Start linking a mail account
//! - `POST /api/v1/workflows/sync`    : Upload workflow definitions
//! - `POST /api/v1/actions/log`       : Record a taken action
//!
//! Every endpoint that names a `user_id` requires it to match the caller.

use axum::{
    Extension, Router,
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use inboxpilot_core::{ActionSuggestion, EmailContext, EmailContextRequest, FieldError, InputError};
use inboxpilot_pipeline::PipelineError;
use inboxpilot_security::{AuthError, Identity};

use crate::{AuthenticatedUser, SharedState};

/// Header carrying the per-request provider override.
pub const PROVIDER_HEADER: &str = "x-ai-provider";

/// Stands in for a provider header that is not visible ASCII, so it is
/// treated as an unknown name.
const UNREADABLE_PROVIDER: &str = "<non-ascii>";

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<FieldError>,
}

/// Everything a handler can fail with, mapped onto a status code.
#[derive(Debug)]
pub enum ApiError {
    /// Body or query could not be decoded.
    Rejected { status: StatusCode, message: String },
    /// Decoded but failed field validation.
    Validation(InputError),
    /// Provider override could not be honored.
    BadProvider(String),
    Unauthorized(AuthError),
    Forbidden,
    RateLimited,
    /// Provider or schema failure. Details stay in the logs.
    Upstream,
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Rejected {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: rejection.body_text(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Selection(e) => Self::BadProvider(e.to_string()),
            PipelineError::Provider { .. } | PipelineError::Schema { .. } => Self::Upstream,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, details) = match self {
            Self::Rejected { status, message } => (status, message, Vec::new()),
            Self::Validation(e) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Invalid email context".to_string(),
                e.errors,
            ),
            Self::BadProvider(message) => (StatusCode::BAD_REQUEST, message, Vec::new()),
            Self::Unauthorized(e) => {
                let body = Json(ErrorResponse {
                    error: e.to_string(),
                    details: Vec::new(),
                });
                return (
                    StatusCode::UNAUTHORIZED,
                    [(header::WWW_AUTHENTICATE, "Bearer")],
                    body,
                )
                    .into_response();
            }
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                "user_id does not match the authenticated user".to_string(),
                Vec::new(),
            ),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded".to_string(),
                Vec::new(),
            ),
            Self::Upstream => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AI provider failed to produce a valid suggestion".to_string(),
                Vec::new(),
            ),
        };
        (status, Json(ErrorResponse { error, details })).into_response()
    }
}

fn ensure_same_user(identity: &Identity, user_id: &str) -> Result<(), ApiError> {
    if identity.user_id != user_id {
        warn!(
            caller = %identity.user_id,
            requested = %user_id,
            "user_id does not match token subject"
        );
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

// ── Router ────────────────────────────────────────────────────────────────

/// Routes for the account, workflow, and action-log stubs.
pub fn stub_router() -> Router<SharedState> {
    Router::new()
        .route("/api/v1/user/status", get(user_status_handler))
        .route("/api/v1/accounts/add", post(add_account_handler))
        .route("/api/v1/workflows/sync", post(sync_workflows_handler))
        .route("/api/v1/actions/log", post(log_action_handler))
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Deserialize)]
pub struct UserQuery {
    user_id: String,
}

#[derive(Deserialize)]
pub struct AddAccountQuery {
    user_id: String,
    provider: String,
}

#[derive(Serialize, Deserialize)]
pub struct UserStatusResponse {
    pub user_id: String,
    pub subscription_status: String,
    pub email_count_monthly: u32,
    pub limit_monthly: u32,
    pub is_active: bool,
}

#[derive(Serialize, Deserialize)]
pub struct StatusMessage {
    pub status: String,
    pub message: String,
}

impl StatusMessage {
    fn success(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            status: "success".into(),
            message: message.into(),
        })
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────

pub async fn suggest_action_handler(
    State(state): State<SharedState>,
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    payload: Result<Json<EmailContextRequest>, JsonRejection>,
) -> Result<Json<ActionSuggestion>, ApiError> {
    let Json(request) = payload?;

    let context = EmailContext::try_from(request).map_err(|e| {
        info!(errors = %e, "Rejected email context");
        ApiError::Validation(e)
    })?;
    ensure_same_user(&identity, context.user_id())?;

    let provider_override = match headers.get(PROVIDER_HEADER) {
        None => None,
        Some(value) => match value.to_str() {
            Ok(name) => Some(name),
            Err(_) => {
                warn!(user_id = context.user_id(), "Provider header is not visible ASCII");
                Some(UNREADABLE_PROVIDER)
            }
        },
    };

    let suggestion = state
        .pipeline
        .suggest(&context, provider_override)
        .await
        .map_err(|e| {
            if !matches!(e, PipelineError::Selection(_)) {
                error!(user_id = context.user_id(), stage = %e.stage(), error = %e, "Suggestion failed");
            }
            ApiError::from(e)
        })?;

    Ok(Json(suggestion))
}

async fn user_status_handler(
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<UserStatusResponse>, ApiError> {
    let Query(query) = query?;
    ensure_same_user(&identity, &query.user_id)?;

    Ok(Json(UserStatusResponse {
        user_id: query.user_id,
        subscription_status: "pro".into(),
        email_count_monthly: 42,
        limit_monthly: 1000,
        is_active: true,
    }))
}

async fn add_account_handler(
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
    query: Result<Query<AddAccountQuery>, QueryRejection>,
) -> Result<Json<StatusMessage>, ApiError> {
    let Query(query) = query?;
    ensure_same_user(&identity, &query.user_id)?;

    info!(user_id = %query.user_id, provider = %query.provider, "Account link requested");
    Ok(StatusMessage::success(format!(
        "OAuth flow initiated for user {} with provider {}. Tokens would be stored securely.",
        query.user_id, query.provider
    )))
}

async fn sync_workflows_handler(
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
    query: Result<Query<UserQuery>, QueryRejection>,
    payload: Result<Json<Vec<Value>>, JsonRejection>,
) -> Result<Json<StatusMessage>, ApiError> {
    let Query(query) = query?;
    ensure_same_user(&identity, &query.user_id)?;
    let Json(workflows) = payload?;

    info!(user_id = %query.user_id, count = workflows.len(), "Workflows synced");
    Ok(StatusMessage::success(format!(
        "Synced {} workflows for user {}.",
        workflows.len(),
        query.user_id
    )))
}

async fn log_action_handler(
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<StatusMessage>, ApiError> {
    let Json(entry) = payload?;
    if let Some(user_id) = entry.get("user_id").and_then(Value::as_str) {
        ensure_same_user(&identity, user_id)?;
    }

    let action = entry
        .get("action")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");
    info!(user_id = %identity.user_id, action, "Action logged");
    Ok(StatusMessage::success("Action logged successfully."))
}
