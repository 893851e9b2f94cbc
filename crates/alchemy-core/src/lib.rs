//! Shared domain types and error taxonomy for the Prompt Alchemy workspace.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{
    CrossPhaseMode, EnhancedContext, GenerateOptions, GenerateRequest, GenerationResult,
    Interaction, InteractionAction, ModelMetadata, Phase, PhaseConfig, Prompt, RankingFeatures,
    RankingWeights, Relationship, RelationshipKind, UsageAnalytics,
};
