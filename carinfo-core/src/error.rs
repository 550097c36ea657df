//! Error types for CarInfo

use std::path::PathBuf;
use thiserror::Error;

/// A record payload that could not be coerced into its typed form
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("field '{field}' {reason}")]
pub struct SchemaError {
    /// Offending field, or `$` when the payload itself is malformed
    pub field: String,
    /// What went wrong with it
    pub reason: String,
}

impl SchemaError {
    /// Create a schema error for a field
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Main error type for CarInfo operations
#[derive(Error, Debug)]
pub enum CarInfoError {
    /// Identifier does not match `car<N>`
    #[error("invalid car ID '{0}'")]
    InvalidIdentifier(String),

    /// Payload failed schema validation
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// No car with this identifier
    #[error("no such car with ID '{0}'")]
    CarNotFound(String),

    /// Car exists but has no status record
    #[error("no status for car with ID '{0}'")]
    StatusNotFound(String),

    /// Snapshot file could not be read or written
    #[error("Storage error at {}: {source}", .path.display())]
    Storage {
        /// Snapshot path
        path: PathBuf,
        /// Underlying IO failure
        #[source]
        source: std::io::Error,
    },

    /// Snapshot file exists but is not a valid snapshot
    #[error("Corrupt snapshot at {}: {source}", .path.display())]
    CorruptSnapshot {
        /// Snapshot path
        path: PathBuf,
        /// Underlying decode failure
        #[source]
        source: serde_json::Error,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl CarInfoError {
    /// Whether this error is a storage failure rather than a caller mistake
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            CarInfoError::Storage { .. } | CarInfoError::CorruptSnapshot { .. }
        )
    }
}

/// Result type alias for CarInfo operations
pub type Result<T> = std::result::Result<T, CarInfoError>;
