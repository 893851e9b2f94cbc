//! Shared error taxonomy for the Prompt Alchemy workspace.
//!
//! One enum crosses every component boundary so callers can match on a
//! single taxonomy (see the error-handling design) instead of converting
//! between per-crate error types at every seam.

use thiserror::Error;

/// Error kinds shared by the provider registry, storage engine, phase
/// engine, and both transports.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input, out-of-range values, unknown phase.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Unknown prompt id, unknown provider, unknown relationship endpoint.
    #[error("not found: {0}")]
    NotFound(String),

    /// Upstream provider call failure; carries the provider name.
    #[error("provider '{provider}' error: {message}")]
    ProviderError {
        /// Provider name.
        provider: String,
        /// Underlying cause.
        message: String,
    },

    /// Subclass of `ProviderError`; triggers a phase skip, not fatal.
    #[error("provider '{provider}' timed out after {timeout_ms}ms")]
    ProviderTimeout {
        /// Provider name.
        provider: String,
        /// Configured timeout.
        timeout_ms: u64,
    },

    /// A write supplied an embedding whose length disagrees with the
    /// store's configured `(model, dim)`.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    EmbeddingDimMismatch {
        /// Dimension configured for the store.
        expected: usize,
        /// Dimension of the embedding that was supplied.
        actual: usize,
    },

    /// Durability or I/O failure; always fatal to the call.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Every phase in a generation request failed.
    #[error("generation failed: {0}")]
    GenerationFailed(String),

    /// Malformed JSON-RPC; the reader continues after reporting this.
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// Any other internal failure (serialization, join errors, etc).
    #[error("internal error: {0}")]
    Internal(String),

    /// The caller's `CancellationToken` fired before the operation
    /// finished.
    #[error("operation cancelled")]
    Cancelled,
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Internal(format!("serialization: {e}"))
    }
}

/// Convenience result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;
