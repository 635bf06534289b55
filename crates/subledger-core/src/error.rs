//! Error types for the ledger core.
//!
//! [`LedgerError`] is the only error the filter builder and the period
//! aggregator can produce. Malformed input is always reported, never replaced
//! by a default value.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`LedgerError`].
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors raised by the ledger core and its ambient setup.
#[derive(Debug, Error)]
pub enum LedgerError {
    // =========================================================================
    // Input Errors
    // =========================================================================
    /// A supplied criterion or period value is not well-formed.
    #[error("invalid {field} '{value}': {message}")]
    InvalidArgument {
        field: String,
        value: String,
        message: String,
    },

    // =========================================================================
    // Setup Errors
    // =========================================================================
    /// Directory creation failed
    #[error("Failed to create directory: {path}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl LedgerError {
    /// Create an InvalidArgument error naming the offending field and raw value.
    pub fn invalid_argument(
        field: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            value: value.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this error describes malformed caller input.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }

    /// Name of the offending field, for input errors.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidArgument { field, .. } => Some(field),
            _ => None,
        }
    }
}
