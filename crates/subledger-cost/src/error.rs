//! Error types for the subscription store and service.

use subledger_core::LedgerError;
use thiserror::Error;
use uuid::Uuid;

/// Subscription ledger errors.
#[derive(Error, Debug)]
pub enum CostError {
    /// Malformed criterion or period value from the ledger core
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database locked error (retryable)
    #[error("database is locked (retry {retry_count}/{max_retries}): {message}")]
    DatabaseLocked {
        /// Retry attempt number
        retry_count: u32,
        /// Maximum retries allowed
        max_retries: u32,
        /// Human-readable message
        message: String,
    },

    /// No subscription with the given id
    #[error("subscription not found: {id}")]
    NotFound {
        /// Requested subscription id
        id: Uuid,
    },

    /// A well-formed value that breaks a subscription invariant
    #[error("validation failed for {field}: {message}")]
    Validation {
        /// Offending field
        field: String,
        /// What is wrong with it
        message: String,
    },

    /// Migration error
    #[error("migration error: {0}")]
    Migration(String),
}

impl CostError {
    /// Create a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Check if this error is retryable (e.g., database locked).
    pub fn is_retryable(&self) -> bool {
        is_database_locked_error(self)
    }

    /// Check if this error reports a missing subscription.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CostError::NotFound { .. })
    }

    /// Check if this error was caused by malformed or invalid caller input.
    pub fn is_invalid_argument(&self) -> bool {
        match self {
            CostError::Ledger(e) => e.is_invalid_argument(),
            CostError::Validation { .. } => true,
            _ => false,
        }
    }
}

/// Check if a CostError indicates a database lock.
pub fn is_database_locked_error(error: &CostError) -> bool {
    match error {
        CostError::DatabaseLocked { .. } => true,
        CostError::Database(rusqlite::Error::SqliteFailure(e, _)) => {
            e.code == rusqlite::ErrorCode::DatabaseBusy
                || e.code == rusqlite::ErrorCode::DatabaseLocked
        }
        _ => false,
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, CostError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_error_is_invalid_argument() {
        let err: CostError = LedgerError::invalid_argument("user_id", "x", "bad uuid").into();
        assert!(err.is_invalid_argument());
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("user_id"));
    }

    #[test]
    fn test_not_found() {
        let err = CostError::NotFound { id: Uuid::nil() };
        assert!(err.is_not_found());
        assert!(!err.is_invalid_argument());
    }

    #[test]
    fn test_locked_is_retryable() {
        let err = CostError::DatabaseLocked {
            retry_count: 1,
            max_retries: 5,
            message: "busy".into(),
        };
        assert!(err.is_retryable());

        let busy = CostError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        ));
        assert!(busy.is_retryable());
    }
}
