//! Error types for the InboxPilot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the gateway decides how
//! each one is surfaced to HTTP callers.

use std::time::Duration;

use thiserror::Error;

// --- Input validation (caller's fault) ---

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// The inbound email context failed validation. Carries every failing field.
#[derive(Debug, Clone, Error)]
#[error("Invalid email context: {}", join_fields(.errors))]
pub struct InputError {
    pub errors: Vec<FieldError>,
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl InputError {
    /// Whether `field` is among the failing fields.
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

// --- Upstream provider errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),

    #[error("{provider} did not return a tool call")]
    MissingToolCall { provider: String },

    #[error("{provider} response did not contain a JSON object")]
    MissingJson { provider: String, raw: String },

    #[error("{provider} returned an undecodable response body: {reason}")]
    InvalidResponse {
        provider: String,
        reason: String,
        raw: String,
    },

    #[error("{provider} returned malformed JSON: {reason}")]
    MalformedJson {
        provider: String,
        reason: String,
        raw: String,
    },
}

impl ProviderError {
    /// Whether the upstream answered but ignored the structured-output directive.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::MissingToolCall { .. }
                | Self::MissingJson { .. }
                | Self::MalformedJson { .. }
                | Self::InvalidResponse { .. }
                | Self::Timeout(_)
        )
    }

    /// The raw upstream text attached to this error, if any.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Self::MissingJson { raw, .. }
            | Self::MalformedJson { raw, .. }
            | Self::InvalidResponse { raw, .. } => Some(raw),
            Self::ApiError { message, .. } => Some(message),
            _ => None,
        }
    }
}

// --- Output contract errors ---

/// The upstream produced JSON that violates the ActionSuggestion contract.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("Expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("Missing required field `{0}`")]
    MissingField(&'static str),

    #[error("Field `{field}` must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("Field `{field}` is out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("Field `{field}` has unsupported value `{value}`")]
    UnknownVariant { field: &'static str, value: String },
}
