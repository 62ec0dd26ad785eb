//! Error types for curator

use thiserror::Error;

/// Result type alias for curator operations
pub type Result<T> = std::result::Result<T, CuratorError>;

/// Server error code reported for unique index violations
pub const DUPLICATE_KEY_CODE: i32 = 11000;

/// Unified error type for store operations
#[derive(Error, Debug, Clone)]
pub enum CuratorError {
    #[error("MongoDB error: {0}")]
    MongoDB(String),

    #[error("Connection error: {0}")]
    Connection(String),

    /// Unique index violation (server code 11000)
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CuratorError {
    /// Returns true if this error is a unique index violation
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, CuratorError::DuplicateKey(_))
    }
}

impl From<serde_json::Error> for CuratorError {
    fn from(err: serde_json::Error) -> Self {
        CuratorError::Serialization(err.to_string())
    }
}

// MongoDB-specific error conversions (when mongodb-errors feature is enabled)
#[cfg(feature = "mongodb-errors")]
impl From<mongodb::error::Error> for CuratorError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::{ErrorKind, WriteFailure};

        let code = match err.kind.as_ref() {
            ErrorKind::Command(command_error) => Some(command_error.code),
            ErrorKind::Write(WriteFailure::WriteError(write_error)) => Some(write_error.code),
            _ => None,
        };

        // Bulk writes surface the code only in the message
        if code == Some(DUPLICATE_KEY_CODE) || err.to_string().contains("E11000") {
            return CuratorError::DuplicateKey(err.to_string());
        }

        match err.kind.as_ref() {
            ErrorKind::ServerSelection { .. }
            | ErrorKind::Io(_)
            | ErrorKind::ConnectionPoolCleared { .. }
            | ErrorKind::DnsResolve { .. } => CuratorError::Connection(err.to_string()),
            ErrorKind::InvalidArgument { .. } => CuratorError::Config(err.to_string()),
            _ => CuratorError::MongoDB(err.to_string()),
        }
    }
}

#[cfg(feature = "mongodb-errors")]
impl From<bson::ser::Error> for CuratorError {
    fn from(err: bson::ser::Error) -> Self {
        CuratorError::Serialization(format!("BSON serialization error: {}", err))
    }
}

#[cfg(feature = "mongodb-errors")]
impl From<bson::de::Error> for CuratorError {
    fn from(err: bson::de::Error) -> Self {
        CuratorError::Serialization(format!("BSON deserialization error: {}", err))
    }
}
