//! Error types for rosterex operations
//!
//! This module defines the error types used throughout the aggregation
//! engine, providing clear error messages and proper error chaining support.
//!
//! Expected shard-level failures (unreachable endpoint, malformed body,
//! record-level errors reported by a shard) are deliberately *not* modeled
//! here: the client degrades them into placeholder records so the merge and
//! retry paths can treat them uniformly. Only validation problems and
//! unexpected engine faults surface as `RosterexError`.

use thiserror::Error;

/// Main error type for all rosterex operations
#[derive(Debug, Error)]
pub enum RosterexError {
    /// Registration number validation failed
    #[error("Invalid registration number: {reason}. {suggestion}")]
    InvalidRegistration { reason: String, suggestion: String },

    /// No exam context was selected for the query
    #[error("No exam selected: {0}")]
    ExamNotSelected(String),

    /// Semester ordinal outside the supported range
    #[error("Invalid semester: {0}")]
    InvalidSemester(String),

    /// Configuration validation failed
    #[error("Configuration error: {0}")]
    Config(String),

    /// A shard key has no configured endpoint
    #[error("Shard key misconfigured: no endpoint for '{0}'")]
    ShardKey(String),

    /// Engine-internal fault that cannot be degraded into placeholder records
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RosterexError {
    /// Create an invalid registration error
    pub fn invalid_registration(reason: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::InvalidRegistration {
            reason: reason.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a detailed config error
    pub fn config_error(field: impl Into<String>, reason: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Config(format!("{} - {}: {}", field.into(), reason.into(), suggestion.into()))
    }

    /// True when the error is a synchronous input validation failure rather
    /// than an engine fault
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidRegistration { .. } | Self::ExamNotSelected(_) | Self::InvalidSemester(_)
        )
    }
}
