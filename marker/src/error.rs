//! Marker Error Types
//!
//! This module defines the [`MarkerError`] enum, covering everything that can go wrong
//! while loading an expectation set or driving a marking job. Problems inside the learner's
//! fragment are never a `MarkerError`: the sandbox reports those as unsuccessful result
//! records and they are marked like any other outcome.
//!
//! # Example
//!
//! ```rust
//! use marker::error::MarkerError;
//!
//! fn require_name(name: &str) -> Result<(), MarkerError> {
//!     if name.is_empty() {
//!         return Err(MarkerError::MissingField("name".to_string()));
//!     }
//!     Ok(())
//! }
//!
//! assert!(require_name("").is_err());
//! ```

use std::fmt;

/// Represents all error types that can occur in the marker system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerError {
    /// JSON is malformed or does not match the expectation schema.
    InvalidJson(String),
    /// A required field is missing or empty.
    MissingField(String),
    /// A pattern could not be compiled or interpreted.
    InvalidPattern(String),
    /// The worker running a submission failed or was cancelled.
    Execution(String),
}

impl fmt::Display for MarkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerError::InvalidJson(msg) => write!(f, "Invalid JSON: {msg}"),
            MarkerError::MissingField(field) => write!(f, "Missing field: {field}"),
            MarkerError::InvalidPattern(msg) => write!(f, "Invalid pattern: {msg}"),
            MarkerError::Execution(msg) => write!(f, "Execution failed: {msg}"),
        }
    }
}

impl std::error::Error for MarkerError {}

impl From<serde_json::Error> for MarkerError {
    fn from(err: serde_json::Error) -> Self {
        MarkerError::InvalidJson(err.to_string())
    }
}

impl From<tokio::task::JoinError> for MarkerError {
    fn from(err: tokio::task::JoinError) -> Self {
        MarkerError::Execution(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            MarkerError::MissingField("patterns".into()).to_string(),
            "Missing field: patterns"
        );
        assert_eq!(
            MarkerError::InvalidPattern("[a-".into()).to_string(),
            "Invalid pattern: [a-"
        );
    }

    #[test]
    fn test_from_serde_error() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(MarkerError::from(err), MarkerError::InvalidJson(_)));
    }
}
