//! Error type for `alchemy-storage`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("vector index error: {0}")]
    Index(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for alchemy_core::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::NotFound(m) => alchemy_core::Error::NotFound(m),
            Error::DimensionMismatch { expected, actual } => {
                alchemy_core::Error::EmbeddingDimMismatch { expected, actual }
            }
            Error::InvalidArgument(m) => alchemy_core::Error::InvalidArgument(m),
            other => alchemy_core::Error::StorageError(other.to_string()),
        }
    }
}
