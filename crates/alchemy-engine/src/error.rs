//! Error taxonomy for generation, ranking, judging, optimization and
//! learning failures, converting at the boundary to the shared taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no phase produced any variant")]
    GenerationFailed,

    #[error("phase '{phase}' failed: {reason}")]
    PhaseFailed { phase: String, reason: String },

    #[error("judge returned an unparseable response: {0}")]
    JudgeUnparseable(String),

    #[error("optimizer target score {target} is out of range [0,1]")]
    InvalidTargetScore { target: f32 },

    #[error("not enough training pairs for a learning run: have {have}, need {need}")]
    InsufficientTrainingData { have: usize, need: usize },

    #[error("ranker weights do not sum to 1.0 (sum = {sum})")]
    InvalidWeights { sum: f32 },

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Provider(#[from] alchemy_providers::Error),

    #[error(transparent)]
    Storage(#[from] alchemy_storage::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to serialize ranker weights: {0}")]
    WeightsSerialization(#[from] toml::ser::Error),
}

impl From<Error> for alchemy_core::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::GenerationFailed => alchemy_core::Error::GenerationFailed(e.to_string()),
            Error::PhaseFailed { .. } => alchemy_core::Error::GenerationFailed(e.to_string()),
            Error::JudgeUnparseable(_) => alchemy_core::Error::GenerationFailed(e.to_string()),
            Error::InvalidTargetScore { .. } => alchemy_core::Error::InvalidArgument(e.to_string()),
            Error::InsufficientTrainingData { .. } => alchemy_core::Error::Internal(e.to_string()),
            Error::InvalidWeights { .. } => alchemy_core::Error::InvalidArgument(e.to_string()),
            Error::Cancelled => alchemy_core::Error::Cancelled,
            Error::Provider(inner) => inner.into(),
            Error::Storage(inner) => inner.into(),
            Error::Io(inner) => alchemy_core::Error::Internal(inner.to_string()),
            Error::Serialization(inner) => alchemy_core::Error::from(inner),
            Error::WeightsSerialization(inner) => alchemy_core::Error::Internal(inner.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
