//! Error types for the `adk-vertex-rag` crate.

use thiserror::Error;

/// Errors that can occur in corpus operations.
///
/// Every failure caused by the managed RAG platform (network, permission,
/// not-found) collapses into [`RagError::Service`] carrying the operation
/// name and a human-readable message.
#[derive(Debug, Error)]
pub enum RagError {
    /// A call to the RAG service failed.
    #[error("{operation} failed: {message}")]
    Service {
        /// The service operation that failed (e.g. `list_corpora`).
        operation: &'static str,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A tool was invoked with missing or mistyped arguments.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A payload could not be encoded or decoded.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl RagError {
    /// Build a [`RagError::Service`] for the given operation.
    pub fn service(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Service { operation, message: message.into() }
    }
}

/// A convenience result type for corpus operations.
pub type Result<T> = std::result::Result<T, RagError>;
