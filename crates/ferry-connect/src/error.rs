//! Error types for ferry-connect
//!
//! Two layers, mirroring how the pieces are used:
//! - [`ConnectorError`] is returned by the task, the storage capability and the
//!   row readers. Its variants carry the failure classification the poll cycle
//!   relies on (file races vs. malformed data vs. fatal storage failures).
//! - [`ConnectError`] is the runtime error used by the runner and the binary.

use std::fmt;
use thiserror::Error;

/// Result type alias for the connector runtime
pub type Result<T> = std::result::Result<T, ConnectError>;

/// Result type alias for connector operations
pub type ConnectorResult<T> = std::result::Result<T, ConnectorError>;

/// Main error type for the connector runtime
#[derive(Error, Debug)]
pub enum ConnectError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Delivery to the record sink failed
    #[error("Sink '{name}' error: {message}")]
    Sink { name: String, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Shutdown requested
    #[error("Shutdown requested")]
    Shutdown,

    /// Error raised by the task or one of its collaborators
    #[error(transparent)]
    Connector(#[from] ConnectorError),
}

/// Errors that can occur in connector operations
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Configuration validation failed
    #[error("configuration error: {0}")]
    Config(String),

    /// Path vanished between listing and use
    #[error("not found: {path}")]
    NotFound { path: String },

    /// Storage operation failed for a reason other than a missing path
    #[error("storage error: {op} '{path}' failed: {message}")]
    Storage {
        op: &'static str,
        path: String,
        message: String,
    },

    /// File content could not be decoded into rows
    #[error("malformed data in '{path}': {message}")]
    Malformed { path: String, message: String },

    /// Data serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Task lifecycle misuse (e.g. polling a stopped task)
    #[error("state error: {0}")]
    State(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ConnectorError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a not-found error for `path`
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create a storage error naming the failed operation and path
    pub fn storage(op: &'static str, path: impl Into<String>, msg: impl fmt::Display) -> Self {
        Self::Storage {
            op,
            path: path.into(),
            message: msg.to_string(),
        }
    }

    /// Create a malformed-data error for `path`
    pub fn malformed(path: impl Into<String>, msg: impl fmt::Display) -> Self {
        Self::Malformed {
            path: path.into(),
            message: msg.to_string(),
        }
    }

    /// Map an `std::io::Error` from a storage call, keeping `NotFound` distinct
    pub fn from_io(op: &'static str, path: impl Into<String>, err: std::io::Error) -> Self {
        let path = path.into();
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::storage(op, path, err)
        }
    }

    /// The path vanished; the caller may skip it and carry on
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// The file content is bad; the file is routed to the error folder
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }

    /// Whether a host runtime may retry the failed operation
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl ConnectError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a sink error
    pub fn sink(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Sink {
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Check if this is a shutdown error
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown)
    }
}

/// Connector status for health checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorStatus {
    /// Starting up
    Starting,
    /// Running normally
    Running,
    /// Stopped
    Stopped,
    /// Failed permanently
    Failed,
}

impl fmt::Display for ConnectorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_operation_and_path() {
        let err = ConnectorError::storage("file_type", "/input/a.csv", "permission denied");
        assert_eq!(
            err.to_string(),
            "storage error: file_type '/input/a.csv' failed: permission denied"
        );
    }

    #[test]
    fn test_from_io_keeps_not_found_distinct() {
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(ConnectorError::from_io("open", "/input/a", missing).is_not_found());

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err = ConnectorError::from_io("open", "/input/a", denied);
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("open '/input/a'"));
    }

    #[test]
    fn test_classification() {
        assert!(ConnectorError::not_found("/x").is_retryable());
        assert!(ConnectorError::malformed("/x", "bad row").is_malformed());
        assert!(!ConnectorError::config("bad").is_malformed());
        assert!(!ConnectorError::storage("open", "/x", "boom").is_retryable());
    }

    #[test]
    fn test_shutdown_check() {
        assert!(ConnectError::Shutdown.is_shutdown());
        assert!(!ConnectError::config("bad").is_shutdown());
    }

    #[test]
    fn test_connector_error_is_transparent() {
        let err: ConnectError = ConnectorError::not_found("/input/a.csv").into();
        assert_eq!(err.to_string(), "not found: /input/a.csv");
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ConnectorStatus::Running.to_string(), "running");
        assert_eq!(ConnectorStatus::Failed.to_string(), "failed");
    }
}
