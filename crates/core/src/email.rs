//! The inbound email context.
//!
//! Requests arrive as a plain [`EmailContextRequest`] and are turned into an
//! immutable [`EmailContext`] through `TryFrom`, which checks every field
//! and reports all failures together.

use serde::{Deserialize, Serialize};

use crate::error::{FieldError, InputError};

pub const MAX_SUBJECT_CHARS: usize = 500;
pub const MAX_BODY_CHARS: usize = 10_000;
pub const MAX_THREAD_HISTORY_CHARS: usize = 5_000;
pub const MAX_WORKFLOW_RULES_CHARS: usize = 2_000;
pub const MAX_USER_ID_CHARS: usize = 256;
pub const MIN_SENDER_CHARS: usize = 5;
pub const MAX_SENDER_CHARS: usize = 320;

/// Characters a context can carry across all of its fields.
pub const MAX_CONTEXT_CHARS: usize = MAX_SUBJECT_CHARS
    + MAX_BODY_CHARS
    + MAX_THREAD_HISTORY_CHARS
    + MAX_WORKFLOW_RULES_CHARS
    + MAX_USER_ID_CHARS
    + MAX_SENDER_CHARS;

/// Raw request body of `POST /api/v1/ai/suggest-action`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailContextRequest {
    pub subject: String,
    pub body: String,
    pub sender: String,
    #[serde(default)]
    pub thread_history: Option<String>,
    pub user_id: String,
    pub workflow_rules: String,
}

/// A validated email context. Fields are read-only once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailContext {
    subject: String,
    body: String,
    sender: String,
    thread_history: Option<String>,
    user_id: String,
    workflow_rules: String,
}

impl EmailContext {
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Thread history; `None` when absent or whitespace-only.
    pub fn thread_history(&self) -> Option<&str> {
        self.thread_history.as_deref()
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn workflow_rules(&self) -> &str {
        &self.workflow_rules
    }
}

impl TryFrom<EmailContextRequest> for EmailContext {
    type Error = InputError;

    fn try_from(req: EmailContextRequest) -> Result<Self, Self::Error> {
        let mut errors = Vec::new();

        check_text(&mut errors, "subject", &req.subject, MAX_SUBJECT_CHARS);
        check_text(&mut errors, "body", &req.body, MAX_BODY_CHARS);
        check_text(&mut errors, "user_id", &req.user_id, MAX_USER_ID_CHARS);
        check_text(
            &mut errors,
            "workflow_rules",
            &req.workflow_rules,
            MAX_WORKFLOW_RULES_CHARS,
        );
        check_sender(&mut errors, &req.sender);

        let thread_history = req.thread_history.filter(|h| !h.trim().is_empty());
        if let Some(history) = &thread_history {
            let len = history.chars().count();
            if len > MAX_THREAD_HISTORY_CHARS {
                errors.push(FieldError::new(
                    "thread_history",
                    format!("must be at most {MAX_THREAD_HISTORY_CHARS} characters (got {len})"),
                ));
            }
        }

        if !errors.is_empty() {
            return Err(InputError { errors });
        }

        Ok(Self {
            subject: req.subject,
            body: req.body,
            sender: req.sender,
            thread_history,
            user_id: req.user_id,
            workflow_rules: req.workflow_rules,
        })
    }
}

fn check_text(errors: &mut Vec<FieldError>, field: &'static str, value: &str, max: usize) {
    if value.trim().is_empty() {
        errors.push(FieldError::new(field, "must not be empty or whitespace"));
        return;
    }
    let len = value.chars().count();
    if len > max {
        errors.push(FieldError::new(
            field,
            format!("must be at most {max} characters (got {len})"),
        ));
    }
}

fn check_sender(errors: &mut Vec<FieldError>, sender: &str) {
    let len = sender.chars().count();
    if sender.trim().is_empty() {
        errors.push(FieldError::new("sender", "must not be empty or whitespace"));
    } else if len < MIN_SENDER_CHARS {
        errors.push(FieldError::new(
            "sender",
            format!("must be at least {MIN_SENDER_CHARS} characters"),
        ));
    } else if len > MAX_SENDER_CHARS {
        errors.push(FieldError::new(
            "sender",
            format!("must be at most {MAX_SENDER_CHARS} characters"),
        ));
    } else if !is_email_shaped(sender) {
        errors.push(FieldError::new("sender", "must be an email address"));
    }
}

/// `local@domain.tld`: one `@`, no whitespace, dotted domain.
fn is_email_shaped(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}
