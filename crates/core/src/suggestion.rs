//! The action suggestion returned to callers, and the validator that builds
//! it from whatever JSON an upstream model produced.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SchemaError;

/// What the assistant recommends doing with the email.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    DraftReply,
    Archive,
    FlagForReview,
    ScheduleMeeting,
    /// A value outside the known set. Only produced by the relaxed validator.
    Other(String),
}

impl Action {
    pub const KNOWN: [&'static str; 4] =
        ["draft_reply", "archive", "flag_for_review", "schedule_meeting"];

    pub fn as_str(&self) -> &str {
        match self {
            Self::DraftReply => "draft_reply",
            Self::Archive => "archive",
            Self::FlagForReview => "flag_for_review",
            Self::ScheduleMeeting => "schedule_meeting",
            Self::Other(s) => s,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<String> for Action {
    fn from(s: String) -> Self {
        match s.as_str() {
            "draft_reply" => Self::DraftReply,
            "archive" => Self::Archive,
            "flag_for_review" => Self::FlagForReview,
            "schedule_meeting" => Self::ScheduleMeeting,
            _ => Self::Other(s),
        }
    }
}

impl From<Action> for String {
    fn from(a: Action) -> Self {
        a.as_str().to_string()
    }
}

/// How much autonomy the client has when acting on a suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SendPermission {
    AutoSend,
    DraftOnly,
    NeedsReview,
    Other(String),
}

impl SendPermission {
    pub const KNOWN: [&'static str; 3] = ["auto_send", "draft_only", "needs_review"];

    pub fn as_str(&self) -> &str {
        match self {
            Self::AutoSend => "auto_send",
            Self::DraftOnly => "draft_only",
            Self::NeedsReview => "needs_review",
            Self::Other(s) => s,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<String> for SendPermission {
    fn from(s: String) -> Self {
        match s.as_str() {
            "auto_send" => Self::AutoSend,
            "draft_only" => Self::DraftOnly,
            "needs_review" => Self::NeedsReview,
            _ => Self::Other(s),
        }
    }
}

impl From<SendPermission> for String {
    fn from(p: SendPermission) -> Self {
        p.as_str().to_string()
    }
}

/// The validated output of the suggestion pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSuggestion {
    pub action: Action,
    /// In `[0.0, 1.0]`.
    pub confidence: f64,
    pub send_permission: SendPermission,
    #[serde(default)]
    pub reply_text: Option<String>,
    #[serde(default)]
    pub suggested_workflow_id: Option<String>,
}

/// Checks raw provider output against the ActionSuggestion contract.
///
/// Structural checks (presence, JSON types, confidence range) always run.
/// Enum membership of `action` and `send_permission` is checked only in
/// strict mode, which is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputValidator {
    strict_enums: bool,
}

impl Default for OutputValidator {
    fn default() -> Self {
        Self::strict()
    }
}

impl OutputValidator {
    pub fn strict() -> Self {
        Self { strict_enums: true }
    }

    /// Accept any string for `action` and `send_permission`.
    pub fn relaxed() -> Self {
        Self {
            strict_enums: false,
        }
    }

    pub fn new(strict_enums: bool) -> Self {
        Self { strict_enums }
    }

    pub fn is_strict(&self) -> bool {
        self.strict_enums
    }

    pub fn validate(&self, raw: &Value) -> Result<ActionSuggestion, SchemaError> {
        let obj = raw
            .as_object()
            .ok_or_else(|| SchemaError::NotAnObject(json_type_name(raw)))?;

        let action = Action::from(required_string(obj, "action")?);
        let confidence = required_confidence(obj)?;
        let send_permission = SendPermission::from(required_string(obj, "send_permission")?);
        let reply_text = optional_string(obj, "reply_text")?;
        let suggested_workflow_id = optional_string(obj, "suggested_workflow_id")?;

        if self.strict_enums {
            if !action.is_known() {
                return Err(SchemaError::UnknownVariant {
                    field: "action",
                    value: action.as_str().to_string(),
                });
            }
            if !send_permission.is_known() {
                return Err(SchemaError::UnknownVariant {
                    field: "send_permission",
                    value: send_permission.as_str().to_string(),
                });
            }
        }

        Ok(ActionSuggestion {
            action,
            confidence,
            send_permission,
            reply_text,
            suggested_workflow_id,
        })
    }
}

fn required_string(obj: &Map<String, Value>, field: &'static str) -> Result<String, SchemaError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(SchemaError::MissingField(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(SchemaError::WrongType {
            field,
            expected: "a string",
        }),
    }
}

fn required_confidence(obj: &Map<String, Value>) -> Result<f64, SchemaError> {
    let value = match obj.get("confidence") {
        None | Some(Value::Null) => return Err(SchemaError::MissingField("confidence")),
        Some(Value::Number(n)) => n.as_f64().ok_or(SchemaError::WrongType {
            field: "confidence",
            expected: "a finite number",
        })?,
        Some(_) => {
            return Err(SchemaError::WrongType {
                field: "confidence",
                expected: "a number",
            });
        }
    };

    if !(0.0..=1.0).contains(&value) {
        return Err(SchemaError::OutOfRange {
            field: "confidence",
            value,
        });
    }
    Ok(value)
}

fn optional_string(
    obj: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, SchemaError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(SchemaError::WrongType {
            field,
            expected: "a string or null",
        }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
