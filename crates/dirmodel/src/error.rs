//! Error types for the directory mapping layer
//!
//! One taxonomy for the whole crate: connection and schema problems,
//! missing entries, rejected persistence operations, and writes attempted
//! on read-only composed views.

use thiserror::Error;

/// Error that can occur while mapping objects onto a directory tree.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Failed to connect or bind to the directory server.
    #[error("connection to {target} failed: {reason}")]
    Connection {
        target: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Unknown or misdeclared attribute, or an invalid type definition.
    #[error("schema error: {message}")]
    Schema { message: String },

    /// The entry addressed by a dn does not exist (reload/find target missing).
    #[error("entry not found: {dn}")]
    NotFound { dn: String },

    /// The directory rejected an add operation.
    #[error("create failed for {dn}: {reason}")]
    CreateFailed { dn: String, reason: String },

    /// The directory rejected a modify operation.
    #[error("save failed for {dn}: {reason}")]
    SaveFailed { dn: String, reason: String },

    /// The directory rejected a delete operation.
    #[error("destroy failed for {dn}: {reason}")]
    DestroyFailed { dn: String, reason: String },

    /// Write operation attempted on a read-only composed view.
    #[error("operation not supported here: {operation}")]
    NotSupported { operation: String },

    /// Transport-level failure surfaced by the directory protocol client.
    #[error("directory client error: {message}")]
    Client {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ModelError {
    /// Create a connection error.
    pub fn connection(target: impl Into<String>, reason: impl Into<String>) -> Self {
        ModelError::Connection {
            target: target.into(),
            reason: reason.into(),
            source: None,
        }
    }

    /// Create a connection error with the underlying client error attached.
    pub fn connection_with_source(
        target: impl Into<String>,
        reason: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ModelError::Connection {
            target: target.into(),
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        ModelError::Schema {
            message: message.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(dn: impl Into<String>) -> Self {
        ModelError::NotFound { dn: dn.into() }
    }

    /// Create a create-failed error.
    pub fn create_failed(dn: impl Into<String>, reason: impl Into<String>) -> Self {
        ModelError::CreateFailed {
            dn: dn.into(),
            reason: reason.into(),
        }
    }

    /// Create a save-failed error.
    pub fn save_failed(dn: impl Into<String>, reason: impl Into<String>) -> Self {
        ModelError::SaveFailed {
            dn: dn.into(),
            reason: reason.into(),
        }
    }

    /// Create a destroy-failed error.
    pub fn destroy_failed(dn: impl Into<String>, reason: impl Into<String>) -> Self {
        ModelError::DestroyFailed {
            dn: dn.into(),
            reason: reason.into(),
        }
    }

    /// Create a not-supported error.
    pub fn not_supported(operation: impl Into<String>) -> Self {
        ModelError::NotSupported {
            operation: operation.into(),
        }
    }

    /// Create a client error.
    pub fn client(message: impl Into<String>) -> Self {
        ModelError::Client {
            message: message.into(),
            source: None,
        }
    }

    /// Create a client error with the underlying error attached.
    pub fn client_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ModelError::Client {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type for directory mapping operations.
pub type ModelResult<T> = Result<T, ModelError>;
