//! # InboxPilot Core
//!
//! Domain types, traits, and error definitions for the InboxPilot email
//! action service. This crate has **no HTTP or runtime dependencies**: it
//! defines the request and response model, the output contract, and the
//! provider trait that every other crate implements against.
//!
//! ## Layout
//!
//! - [`email`]: the validated inbound [`EmailContext`]
//! - [`suggestion`]: the [`ActionSuggestion`] output and its [`OutputValidator`]
//! - [`prompt`]: deterministic system/user prompt rendering
//! - [`provider`]: the [`SuggestionProvider`] trait over LLM backends
//! - [`error`]: one error enum per bounded context

pub mod email;
pub mod error;
pub mod prompt;
pub mod provider;
pub mod suggestion;

// Re-export key types at crate root for ergonomics
pub use email::{EmailContext, EmailContextRequest};
pub use error::{FieldError, InputError, ProviderError, SchemaError};
pub use prompt::{PersonaStore, StaticPersona, SuggestionPrompt};
pub use provider::{ProviderKind, SuggestionProvider};
pub use suggestion::{Action, ActionSuggestion, OutputValidator, SendPermission};

/// Maximum number of characters of raw upstream text kept in log lines.
pub const LOG_EXCERPT_CHARS: usize = 200;

/// Truncate `text` to at most `max_chars` characters for logging,
/// appending an ellipsis when something was cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}
