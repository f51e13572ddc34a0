//! Prompt rendering.
//!
//! Both functions here are pure: the same inputs always produce the same
//! text, which keeps provider requests reproducible in tests and logs.

use crate::email::EmailContext;

/// Resolves the behavioral persona for a user.
pub trait PersonaStore: Send + Sync {
    fn persona_for(&self, user_id: &str) -> String;
}

/// Returns the same persona for every user.
#[derive(Debug, Clone)]
pub struct StaticPersona(String);

impl StaticPersona {
    pub fn new(persona: impl Into<String>) -> Self {
        Self(persona.into())
    }
}

impl Default for StaticPersona {
    fn default() -> Self {
        Self::new(DEFAULT_PERSONA)
    }
}

impl PersonaStore for StaticPersona {
    fn persona_for(&self, _user_id: &str) -> String {
        self.0.clone()
    }
}

pub const DEFAULT_PERSONA: &str = "You are a professional, concise, and friendly assistant. \
Your tone should be helpful and to the point. Always use a polite closing. \
Your primary goal is to save the user time.";

/// Render the system prompt for one request.
pub fn build_system_prompt(persona: &str, workflow_rules: &str) -> String {
    format!(
        "You are an expert AI Email Automation Agent. Analyze an incoming email and \
suggest the best action, including a draft reply if necessary.\n\n\
User Persona: {persona}\n\n\
Workflow Rules: {workflow_rules}\n\n\
Output strictly as a single JSON object matching the schema below, with no text, \
explanation, or markdown outside the object: {{\n  \
action: string (draft_reply | archive | flag_for_review | schedule_meeting),\n  \
confidence: float (0-1),\n  \
send_permission: string (auto_send | draft_only | needs_review),\n  \
reply_text: string | null,\n  \
suggested_workflow_id: string | null\n}}"
    )
}

/// Render the user turn describing the email.
pub fn build_user_message(context: &EmailContext) -> String {
    format!(
        "Subject: {}\nSender: {}\nBody:\n{}\n\nThread History:\n{}\n",
        context.subject(),
        context.sender(),
        context.body(),
        context.thread_history().unwrap_or("N/A"),
    )
}

/// The rendered conversation handed to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionPrompt {
    pub system: String,
    pub user: String,
}

impl SuggestionPrompt {
    pub fn for_context(personas: &dyn PersonaStore, context: &EmailContext) -> Self {
        let persona = personas.persona_for(context.user_id());
        Self {
            system: build_system_prompt(&persona, context.workflow_rules()),
            user: build_user_message(context),
        }
    }
}
