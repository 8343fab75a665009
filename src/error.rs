//! Error types for Corral
//!
//! All modules use `CorralResult<T>` as their return type.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for Corral operations
pub type CorralResult<T> = Result<T, CorralError>;

/// All errors that can occur in Corral
#[derive(Error, Debug)]
pub enum CorralError {
    // Request errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: String, name: String },

    #[error("{kind} already exists: {name}")]
    AlreadyExists { kind: String, name: String },

    #[error("Service {service} is still bound to: {}", apps.join(", "))]
    ServiceBound { service: String, apps: Vec<String> },

    // Store errors
    #[error("Concurrent modification of {kind} {name}")]
    Conflict { kind: String, name: String },

    #[error("Resource store unavailable: {0}")]
    Unavailable(String),

    #[error("Timed out after {after:?}: {operation}")]
    Timeout { operation: String, after: Duration },

    #[error("Failed to delete cache volume {volume}: {reason}")]
    DeletionFailed { volume: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl CorralError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a not-found error for a resource kind
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a conflict error for a resource kind
    pub fn conflict(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Conflict {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create an invalid-argument error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Conflict { .. } | Self::Unavailable(_) | Self::Timeout { .. }
        )
    }

    /// Whether the error is a transient store failure worth retrying with backoff.
    ///
    /// Conflicts are excluded: they need a fresh read and merge by the caller.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ServiceBound { .. } => Some("Unbind the service first, or delete with --unbind"),
            Self::Unavailable(_) | Self::Timeout { .. } => {
                Some("The operation is safe to retry once the store is reachable")
            }
            Self::Conflict { .. } => Some("Another client changed the resource; retry the command"),
            Self::ConfigInvalid { .. } => Some("Run: corral config show"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CorralError::not_found("service", "s2");
        assert_eq!(err.to_string(), "service not found: s2");
    }

    #[test]
    fn service_bound_lists_apps() {
        let err = CorralError::ServiceBound {
            service: "db".to_string(),
            apps: vec!["web".to_string(), "worker".to_string()],
        };
        assert!(err.to_string().contains("web, worker"));
        assert!(err.hint().is_some());
    }

    #[test]
    fn error_retryable() {
        assert!(CorralError::conflict("application", "a").is_retryable());
        assert!(CorralError::Unavailable("down".to_string()).is_retryable());
        assert!(!CorralError::invalid("empty").is_retryable());
        assert!(!CorralError::not_found("application", "a").is_retryable());
    }

    #[test]
    fn conflict_is_not_transient() {
        assert!(!CorralError::conflict("application", "a").is_transient());
        assert!(CorralError::Timeout {
            operation: "get".to_string(),
            after: Duration::from_secs(1),
        }
        .is_transient());
    }
}
