//! HTTP API gateway for InboxPilot.
//!
//! Exposes the suggestion endpoint, the account/workflow stubs, and
//! unauthenticated health checks.
//!
//! Built on Axum for high performance async HTTP.

pub mod api_v1;

use axum::extract::{ConnectInfo, DefaultBodyLimit};
use axum::{
    Router,
    extract::State,
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use inboxpilot_config::AppConfig;
use inboxpilot_pipeline::SuggestionPipeline;
use inboxpilot_security::{Authenticator, Identity, JwtAuthenticator, bearer_token};

use crate::api_v1::ApiError;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub pipeline: Arc<SuggestionPipeline>,
    pub authenticator: Arc<dyn Authenticator>,
    pub rate_limiter: Arc<RateLimiter>,
    pub max_body_bytes: usize,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    /// Build every subsystem from configuration. Fails when the
    /// configuration is invalid or the default provider cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        config.validate()?;
        let pipeline = SuggestionPipeline::from_config(config)?;
        let authenticator =
            JwtAuthenticator::new(config.auth.jwt_secret.as_deref().unwrap_or_default())?;

        Ok(Self {
            pipeline: Arc::new(pipeline),
            authenticator: Arc::new(authenticator),
            rate_limiter: Arc::new(RateLimiter::new(
                config.rate_limit.requests_per_window,
                Duration::from_secs(config.rate_limit.window_secs),
            )),
            max_body_bytes: config.gateway.max_body_bytes,
        })
    }
}

/// The caller identity, inserted into request extensions by the auth layer.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Identity);

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - Rate limiting (per client IP) on the suggestion route, before auth
/// - Bearer token authentication on every `/api/v1` route
/// - Request body size limit
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    // Later route_layers wrap earlier ones, so the limiter runs first.
    let suggest = Router::new()
        .route("/api/v1/ai/suggest-action", post(api_v1::suggest_action_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    let stubs = api_v1::stub_router()
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(root_handler))
        .merge(suggest)
        .merge(stubs)
        .with_state(state.clone())
        .layer(DefaultBodyLimit::max(state.max_body_bytes))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let state = Arc::new(GatewayState::from_config(&config)?);
    let providers: Vec<String> = state
        .pipeline
        .router()
        .list()
        .iter()
        .map(ToString::to_string)
        .collect();

    let app = build_router(state);

    info!(
        addr = %addr,
        default_provider = %config.default_provider,
        providers = ?providers,
        "Gateway starting"
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

// --- Rate Limiter ---

/// Simple in-memory sliding-window rate limiter.
///
/// Tracks request timestamps per client key (IP address).
/// Thread-safe via `std::sync::Mutex` (non-async, held briefly).
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    clients: std::sync::Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Check if the client is within rate limits. Returns `true` if allowed.
    pub fn check(&self, client_key: &str) -> bool {
        self.check_at(client_key, Instant::now())
    }

    /// Like [`RateLimiter::check`] with an explicit clock reading.
    pub fn check_at(&self, client_key: &str, now: Instant) -> bool {
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());

        // Periodic cleanup: if map grows too large, evict stale entries
        if clients.len() > 10_000 {
            clients.retain(|_, timestamps| {
                timestamps
                    .last()
                    .is_some_and(|t| now.saturating_duration_since(*t) < self.window)
            });
        }

        let timestamps = clients.entry(client_key.to_string()).or_default();
        timestamps.retain(|t| now.saturating_duration_since(*t) < self.window);

        if timestamps.len() >= self.max_requests {
            return false;
        }

        timestamps.push(now);
        true
    }
}

/// Rejects callers over quota with 429. Keyed by peer IP, or "unknown"
/// when the server was started without connect info.
async fn rate_limit_middleware(
    State(state): State<SharedState>,
    req: axum::extract::Request,
    next: Next,
) -> Response {
    let client_key = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if !state.rate_limiter.check(&client_key) {
        warn!(client = %client_key, path = %req.uri().path(), "Rate limit exceeded");
        return ApiError::RateLimited.into_response();
    }

    next.run(req).await
}

/// Authentication middleware for the `/api/v1` routes.
///
/// Requires a valid `Authorization: Bearer <token>` header and records the
/// caller as an [`AuthenticatedUser`] extension.
async fn auth_middleware(
    State(state): State<SharedState>,
    mut req: axum::extract::Request,
    next: Next,
) -> Response {
    let header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let identity = match bearer_token(header).and_then(|t| state.authenticator.authenticate(t)) {
        Ok(identity) => identity,
        Err(e) => {
            warn!(path = %req.uri().path(), reason = %e, "Unauthorized request");
            return ApiError::Unauthorized(e).into_response();
        }
    };

    req.extensions_mut().insert(AuthenticatedUser(identity));
    next.run(req).await
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    message: &'static str,
    status: &'static str,
    version: &'static str,
}

async fn root_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: "InboxPilot backend is running.",
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}
