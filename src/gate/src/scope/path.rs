//! Scope path parsing and validation
//!
//! Paths are colon-separated segment lists (`billing:invoices:create`).
//! Validation happens once, at the boundary, before any tree walk.

use std::fmt;
use std::str::FromStr;

use crate::error::{GateError, Result};

/// Path segment separator
pub const SEPARATOR: char = ':';

/// Validates a single path segment or scope name
///
/// A segment must be non-empty and may not contain the separator,
/// whitespace, or control characters.
pub fn validate_segment(segment: &str) -> Result<()> {
    if segment.is_empty() {
        return Err(GateError::InvalidPath("segment cannot be empty".to_string()));
    }

    if segment.contains(SEPARATOR) {
        return Err(GateError::InvalidPath(format!(
            "segment '{}' contains the separator '{}'",
            segment, SEPARATOR
        )));
    }

    if segment.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(GateError::InvalidPath(format!(
            "segment '{}' contains whitespace or control characters",
            segment
        )));
    }

    Ok(())
}

/// A validated colon-delimited path
///
/// # Examples
///
/// ```
/// use cretoai_gate::scope::ScopePath;
///
/// let path = ScopePath::parse("billing:invoices:create").unwrap();
/// assert_eq!(path.depth(), 3);
/// assert_eq!(path.leaf(), "create");
/// assert_eq!(path.parents(), ["billing", "invoices"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopePath {
    /// Original path string
    raw: String,
    /// Parsed segments, never empty
    segments: Vec<String>,
}

impl ScopePath {
    /// Parses and validates a path
    pub fn parse(path: &str) -> Result<Self> {
        if path.is_empty() {
            return Err(GateError::InvalidPath("path cannot be empty".to_string()));
        }

        let segments: Vec<String> = path.split(SEPARATOR).map(str::to_string).collect();

        for segment in &segments {
            validate_segment(segment)
                .map_err(|_| GateError::InvalidPath(format!("malformed path '{}'", path)))?;
        }

        Ok(Self {
            raw: path.to_string(),
            segments,
        })
    }

    /// All segments, parents first
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Segments leading to the leaf's parent scope
    pub fn parents(&self) -> &[String] {
        &self.segments[..self.segments.len() - 1]
    }

    /// Final segment
    pub fn leaf(&self) -> &str {
        &self.segments[self.segments.len() - 1]
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Path of the parent scope, `None` for single-segment paths
    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() <= 1 {
            return None;
        }

        let segments = self.parents().to_vec();
        Some(Self {
            raw: segments.join(":"),
            segments,
        })
    }

    /// Appends a segment
    pub fn join(&self, segment: &str) -> Result<Self> {
        validate_segment(segment)?;

        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self {
            raw: format!("{}{}{}", self.raw, SEPARATOR, segment),
            segments,
        })
    }
}

impl FromStr for ScopePath {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ScopePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}
