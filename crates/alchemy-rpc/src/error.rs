//! Error taxonomy for the RPC crate, converting at the boundary to the
//! shared workspace taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error(transparent)]
    Engine(#[from] alchemy_engine::Error),

    #[error(transparent)]
    Storage(#[from] alchemy_storage::Error),

    #[error(transparent)]
    Provider(#[from] alchemy_providers::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<Error> for alchemy_core::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::UnknownTool(name) => alchemy_core::Error::NotFound(format!("tool '{name}'")),
            Error::InvalidArguments { tool, reason } => {
                alchemy_core::Error::InvalidArgument(format!("{tool}: {reason}"))
            }
            Error::Engine(inner) => inner.into(),
            Error::Storage(inner) => inner.into(),
            Error::Provider(inner) => inner.into(),
            Error::Serialization(inner) => alchemy_core::Error::from(inner),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
