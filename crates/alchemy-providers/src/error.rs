//! Error type for `alchemy-providers`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("provider '{0}' not registered")]
    NotConfigured(String),

    #[error("provider '{0}' api error: {1}")]
    Api(String, String),

    #[error("provider '{0}' timed out after {1}ms")]
    Timeout(String, u64),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response from provider '{0}': {1}")]
    InvalidResponse(String, String),

    #[error("no provider available for task")]
    NoProviderAvailable,

    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for alchemy_core::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::NotConfigured(p) => alchemy_core::Error::NotFound(format!("provider '{p}'")),
            Error::Api(p, m) => alchemy_core::Error::ProviderError { provider: p, message: m },
            Error::Timeout(p, ms) => alchemy_core::Error::ProviderTimeout { provider: p, timeout_ms: ms },
            Error::Network(m) => alchemy_core::Error::ProviderError { provider: "unknown".into(), message: m },
            Error::InvalidResponse(p, m) => alchemy_core::Error::ProviderError { provider: p, message: m },
            Error::NoProviderAvailable => alchemy_core::Error::GenerationFailed("no provider available".into()),
            Error::Cancelled => alchemy_core::Error::Cancelled,
        }
    }
}
