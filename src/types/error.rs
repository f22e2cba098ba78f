//! Unified Error Type System
//!
//! Centralized error types for the entire crate.
//!
//! ## Error Classes
//!
//! - **Configuration**: caller contract violations (empty candidate list, bad
//!   config file). Fail fast and propagate.
//! - **Storage**: failures reported by a storage adapter. Propagated from the
//!   metrics and tenant stores, swallowed by the alert side channel.
//! - **Duplicate key**: a uniqueness violation. For alert inserts this is the
//!   expected steady-state outcome, not a failure.
//!
//! Missing data (no metrics row, no tenant limits) is never an error; it
//! resolves to neutral defaults inside the routing and cost modules.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GovernorError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Caller / Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Config error: {0}")]
    Config(String),

    #[error("No routing candidates supplied")]
    EmptyCandidates,

    #[error("Invalid observation: {field} {reason}")]
    InvalidObservation { field: &'static str, reason: String },

    #[error("Not initialized: run 'routeguard init' first")]
    NotInitialized,

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Background task failed: {0}")]
    TaskJoin(String),
}

impl From<tokio::task::JoinError> for GovernorError {
    fn from(err: tokio::task::JoinError) -> Self {
        GovernorError::TaskJoin(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GovernorError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl GovernorError {
    /// Create an invalid observation error
    pub fn invalid_observation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidObservation {
            field,
            reason: reason.into(),
        }
    }

    /// Check if this error is a uniqueness violation.
    ///
    /// Recognizes the in-memory `DuplicateKey` variant and SQLite
    /// UNIQUE / PRIMARY KEY constraint failures.
    pub fn is_duplicate_key(&self) -> bool {
        match self {
            Self::DuplicateKey(_) => true,
            Self::Database(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.extended_code,
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            ),
            _ => false,
        }
    }

    /// Check if this error is a caller contract violation
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyCandidates | Self::InvalidObservation { .. } | Self::Config(_)
        )
    }
}

/// Context extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn with_context<C: Into<String>>(self, context: C) -> Result<T>;

    /// Add context using a closure (lazy evaluation)
    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| GovernorError::Storage(format!("{}: {}", context.into(), e)))
    }

    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| GovernorError::Storage(format!("{}: {}", f().into(), e)))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(extended_code: i32) -> GovernorError {
        GovernorError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(extended_code),
            Some("constraint failed".to_string()),
        ))
    }

    #[test]
    fn test_duplicate_key_detection() {
        assert!(GovernorError::DuplicateKey("alert".to_string()).is_duplicate_key());
        assert!(sqlite_failure(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE).is_duplicate_key());
        assert!(sqlite_failure(rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY).is_duplicate_key());
    }

    #[test]
    fn test_other_errors_are_not_duplicates() {
        assert!(!sqlite_failure(rusqlite::ffi::SQLITE_CONSTRAINT_NOTNULL).is_duplicate_key());
        assert!(!sqlite_failure(rusqlite::ffi::SQLITE_BUSY).is_duplicate_key());
        assert!(!GovernorError::Storage("disk full".to_string()).is_duplicate_key());
    }

    #[test]
    fn test_caller_errors() {
        assert!(GovernorError::EmptyCandidates.is_caller_error());
        assert!(GovernorError::invalid_observation("latency_ms", "must be finite").is_caller_error());
        assert!(!GovernorError::Storage("x".to_string()).is_caller_error());
    }

    #[test]
    fn test_error_display() {
        let err = GovernorError::invalid_observation("quality_avg", "must be within 0-100");
        assert_eq!(
            err.to_string(),
            "Invalid observation: quality_avg must be within 0-100"
        );
        assert_eq!(
            GovernorError::EmptyCandidates.to_string(),
            "No routing candidates supplied"
        );
    }

    #[test]
    fn test_with_context() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::other("boom"));
        let err = result.with_context("Failed to load limits").unwrap_err();
        assert_eq!(err.to_string(), "Storage error: Failed to load limits: boom");
    }
}
