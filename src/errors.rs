//! Error types for filemcp
//!
//! Two layers: `FsError` is the taxonomy every filesystem operation reports
//! to its caller, `ServerError` covers everything around it (configuration,
//! protocol, process I/O).

use std::io;
use thiserror::Error;

/// Failure of a confined filesystem operation.
///
/// Messages only ever mention the caller-supplied path, never the absolute
/// location of the root boundary.
#[derive(Error, Debug)]
pub enum FsError {
    /// Path would escape the root (absolute, traversal, symlink escape)
    #[error("path rejected: {path}")]
    PathRejected { path: String },

    /// Location does not exist under the root
    #[error("no such file or directory: {path}")]
    NotFound { path: String },

    /// Directory operation on a non-directory
    #[error("not a directory: {path}")]
    NotADirectory { path: String },

    /// File operation on a directory
    #[error("is a directory: {path}")]
    IsADirectory { path: String },

    /// Malformed glob pattern
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Any other underlying filesystem failure
    #[error("{path}: {source}")]
    IoFailure {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl FsError {
    pub fn rejected(path: impl Into<String>) -> Self {
        FsError::PathRejected { path: path.into() }
    }

    /// Classify an I/O error raised while operating on `path`
    pub fn from_io(path: impl Into<String>, err: io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            // A file used as a directory component: the location cannot exist
            io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => FsError::NotFound { path },
            _ => FsError::IoFailure { path, source: err },
        }
    }

    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            FsError::PathRejected { .. } => "path_rejected",
            FsError::NotFound { .. } => "not_found",
            FsError::NotADirectory { .. } => "not_a_directory",
            FsError::IsADirectory { .. } => "is_a_directory",
            FsError::InvalidPattern { .. } => "invalid_pattern",
            FsError::IoFailure { .. } => "io_failure",
        }
    }
}

/// Result type for confined filesystem operations
pub type FsResult<T> = std::result::Result<T, FsError>;

/// Main error type for the server around the filesystem core
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Root boundary could not be established
    #[error("Invalid root directory {path}: {reason}")]
    InvalidRoot { path: String, reason: String },

    /// Malformed or unsupported protocol traffic
    #[error("Protocol error ({code}): {message}")]
    Protocol { code: i64, message: String },

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// Background task failed to complete
    #[error("Task failed: {0}")]
    TaskFailed(String),
}

/// Result type alias for server operations
pub type Result<T> = std::result::Result<T, ServerError>;

impl From<tokio::task::JoinError> for ServerError {
    fn from(err: tokio::task::JoinError) -> Self {
        ServerError::TaskFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        let err = FsError::from_io("a.txt", io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(err.kind(), "not_found");
        assert!(err.to_string().contains("a.txt"));
    }

    #[test]
    fn test_not_a_directory_classification() {
        let err = FsError::from_io("notes.txt/x", io::Error::from(io::ErrorKind::NotADirectory));
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_other_io_is_failure() {
        let err = FsError::from_io("a.txt", io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(err.kind(), "io_failure");
    }

    #[test]
    fn test_error_display() {
        let err = FsError::InvalidPattern {
            pattern: "[".to_string(),
            reason: "invalid range pattern".to_string(),
        };
        assert!(err.to_string().contains("'['"));

        let err = ServerError::Protocol {
            code: -32601,
            message: "method not found".to_string(),
        };
        assert!(err.to_string().contains("-32601"));
    }
}
