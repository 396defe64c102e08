//! Unified error types for the PMT ecosystem
//!
//! This module provides a common error type [`PmtError`] that can represent
//! errors from any part of the system. Domain-specific error types can be
//! converted to `PmtError` for uniform error handling at API boundaries.
//!
//! The variants mirror the failure taxonomy of the planner: bad input data
//! is fatal for the order that carries it but never for the batch; numeric
//! trouble is fatal for a single evaluation unless the whole evaluation
//! budget produced nothing; configuration problems abort before any work
//! starts.

use thiserror::Error;

/// Unified error type for all PMT operations.
#[derive(Error, Debug)]
pub enum PmtError {
    /// I/O errors (file access, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Malformed order data: rate outside [0,1], negative cost, vector
    /// length mismatch, state out of range. Per-order fatal.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Numeric instability: singular fundamental matrix, non-finite
    /// objective, probability mass leak.
    #[error("Numeric error: {0}")]
    Numeric(String),

    /// Configuration errors: unknown key, out-of-range value. Aborts the
    /// batch before any evaluation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cooperative cancellation was requested.
    #[error("Cancelled")]
    Cancelled,

    /// A per-order time budget was exhausted.
    #[error("Timeout after {0:.1}s")]
    Timeout(f64),

    /// A selection was requested on an empty Pareto frontier.
    #[error("Empty frontier")]
    EmptyFrontier,

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using PmtError.
pub type PmtResult<T> = Result<T, PmtError>;

// Conversion from anyhow::Error
impl From<anyhow::Error> for PmtError {
    fn from(err: anyhow::Error) -> Self {
        PmtError::Other(err.to_string())
    }
}

// Conversion from string-like types for convenience
impl From<String> for PmtError {
    fn from(s: String) -> Self {
        PmtError::Other(s)
    }
}

impl From<&str> for PmtError {
    fn from(s: &str) -> Self {
        PmtError::Other(s.to_string())
    }
}

// JSON parsing errors
impl From<serde_json::Error> for PmtError {
    fn from(err: serde_json::Error) -> Self {
        PmtError::Parse(err.to_string())
    }
}

// YAML parsing errors
impl From<serde_yaml::Error> for PmtError {
    fn from(err: serde_yaml::Error) -> Self {
        PmtError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PmtError::Numeric("singular fundamental matrix".into());
        assert!(err.to_string().contains("Numeric error"));
        assert!(err.to_string().contains("singular fundamental matrix"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let pmt_err: PmtError = io_err.into();
        assert!(matches!(pmt_err, PmtError::Io(_)));
    }

    #[test]
    fn test_invalid_input_is_not_config() {
        let err = PmtError::InvalidInput("rate 1.2 outside [0, 1]".into());
        assert!(!matches!(err, PmtError::Config(_)));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> PmtResult<()> {
            Err(PmtError::InvalidInput("test".into()))
        }

        fn outer() -> PmtResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
