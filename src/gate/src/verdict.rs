//! Verdict types and rule context
//!
//! Rules may answer with a plain `bool` or a structured [`Response`]; both
//! are normalized into the closed [`Verdict`] union before the gate branches
//! on them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::error::{GateError, Result};

/// Default denial message
pub const DEFAULT_DENIAL_MESSAGE: &str = "Permission denied";

/// Default denial status code
pub const DEFAULT_DENIAL_STATUS: u16 = 403;

/// Reason attached to a denied verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Denial {
    /// Human readable reason
    pub message: String,

    /// Status code surfaced to adapters (HTTP-like)
    pub status: u16,
}

impl Denial {
    /// Create a denial with a custom message and the default status
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: DEFAULT_DENIAL_STATUS,
        }
    }

    /// Override the status code
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

impl Default for Denial {
    fn default() -> Self {
        Self::new(DEFAULT_DENIAL_MESSAGE)
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.status)
    }
}

/// Normalized rule outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Verdict {
    /// Access granted
    Allowed,

    /// Access refused; `reason` is present when the rule supplied one
    Denied {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<Denial>,
    },
}

impl Verdict {
    /// Denied verdict without a reason (plain `false`)
    pub fn denied() -> Self {
        Self::Denied { reason: None }
    }

    /// Denied verdict carrying a reason
    pub fn denied_with(reason: Denial) -> Self {
        Self::Denied {
            reason: Some(reason),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    pub fn is_denied(&self) -> bool {
        !self.is_allowed()
    }

    /// Succeeds silently when allowed, fails with `AccessDenied` otherwise
    pub fn authorize(self) -> Result<()> {
        match self {
            Self::Allowed => Ok(()),
            Self::Denied { reason } => Err(GateError::AccessDenied(reason.unwrap_or_default())),
        }
    }
}

impl From<bool> for Verdict {
    fn from(allowed: bool) -> Self {
        if allowed {
            Self::Allowed
        } else {
            Self::denied()
        }
    }
}

impl From<Response> for Verdict {
    fn from(response: Response) -> Self {
        if response.allowed {
            return Self::Allowed;
        }

        let mut denial = Denial::default();
        if let Some(message) = response.message {
            denial.message = message;
        }
        if let Some(status) = response.status {
            denial.status = status;
        }
        Self::denied_with(denial)
    }
}

/// Structured rule result, richer than a plain boolean
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Whether access is granted
    pub allowed: bool,

    /// Optional reason, used when denied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Optional status code, used when denied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl Response {
    /// Allow response
    pub fn allow() -> Self {
        Self {
            allowed: true,
            message: None,
            status: None,
        }
    }

    /// Deny response
    pub fn deny() -> Self {
        Self {
            allowed: false,
            message: None,
            status: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn allowed(&self) -> bool {
        self.allowed
    }

    /// Fails with `AccessDenied` exactly when the response is a denial
    pub fn authorize(&self) -> Result<()> {
        Verdict::from(self.clone()).authorize()
    }
}

/// Contextual arguments forwarded to rules
///
/// Holds positional arguments and named attributes as JSON values.
///
/// # Examples
///
/// ```
/// use cretoai_gate::Context;
///
/// let ctx = Context::new()
///     .with_arg(42)
///     .with_attribute("owner", "alice");
///
/// assert_eq!(ctx.arg(0).and_then(|v| v.as_i64()), Some(42));
/// assert_eq!(ctx.attribute_str("owner"), Some("alice"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Positional arguments
    #[serde(default)]
    pub args: Vec<Value>,

    /// Named attributes
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument
    pub fn with_arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Add a named attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Attribute as a string slice, if it is a JSON string
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attribute(key).and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.attributes.is_empty()
    }
}
