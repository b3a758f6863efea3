//! Gate configuration

use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};
use crate::scope::validate_segment;

/// Behaviour when a registration targets a name that is already taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Replace the existing rule or scope
    #[default]
    Overwrite,
    /// Fail with `GateError::Conflict` and leave the registry untouched
    Reject,
}

/// Gate configuration
///
/// # Examples
///
/// ```
/// use cretoai_gate::{ConflictPolicy, GateConfig};
///
/// let config = GateConfig::from_json(r#"{"on_conflict": "reject"}"#).unwrap();
/// assert_eq!(config.on_conflict, ConflictPolicy::Reject);
/// assert_eq!(config.root_name, "root");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Name of the root scope
    pub root_name: String,

    /// Re-registration policy
    pub on_conflict: ConflictPolicy,

    /// Enable check/decision counters
    pub enable_metrics: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            root_name: "root".to_string(),
            on_conflict: ConflictPolicy::Overwrite,
            enable_metrics: true,
        }
    }
}

impl GateConfig {
    /// Strict configuration: re-registration is an error
    pub fn strict() -> Self {
        Self {
            on_conflict: ConflictPolicy::Reject,
            ..Self::default()
        }
    }

    pub fn with_root_name(mut self, name: impl Into<String>) -> Self {
        self.root_name = name.into();
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.on_conflict = policy;
        self
    }

    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.enable_metrics = enabled;
        self
    }

    /// Parses a JSON document; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| GateError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_segment(&self.root_name)
            .map_err(|e| GateError::InvalidConfig(format!("root_name: {}", e)))
    }
}
