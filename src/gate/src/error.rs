//! Error types for the authorization gate

use thiserror::Error;

use crate::verdict::Denial;

/// Gate and scope registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    /// No rule is registered under the path
    #[error("Rule not found: {0}")]
    RuleNotFound(String),

    /// An intermediate (or target) scope of the path does not exist
    #[error("Scope not found: {0}")]
    ScopeNotFound(String),

    /// Malformed path or scope name
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Policy declaration rejected at registration time
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    /// Name already registered and the gate rejects overwrites
    #[error("Conflict: '{0}' is already registered")]
    Conflict(String),

    /// Scope is already linked under a parent, or linking it would form a cycle
    #[error("Scope '{0}' cannot be attached: {1}")]
    ScopeAttached(String, String),

    /// Configuration rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Business-level denial raised by `authorize`
    #[error("Access denied: {0}")]
    AccessDenied(Denial),
}

impl GateError {
    /// Returns true for the denial variant
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied(_))
    }

    /// Status code carried by a denial, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::AccessDenied(denial) => Some(denial.status),
            _ => None,
        }
    }
}

/// Result type for gate operations
pub type Result<T> = std::result::Result<T, GateError>;
