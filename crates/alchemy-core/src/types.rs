//! Domain types shared by every crate in the workspace.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One of the three refinement stages a raw idea passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Extracts and restates the raw intent.
    PrimaMateria,
    /// Refines structure and tone.
    Solutio,
    /// Produces the final, model-ready prompt.
    Coagulatio,
}

impl Phase {
    /// All three phases in pipeline order.
    pub const ALL: [Phase; 3] = [Phase::PrimaMateria, Phase::Solutio, Phase::Coagulatio];

    /// The phase that immediately precedes this one, if any.
    pub fn previous(self) -> Option<Phase> {
        match self {
            Phase::PrimaMateria => None,
            Phase::Solutio => Some(Phase::PrimaMateria),
            Phase::Coagulatio => Some(Phase::Solutio),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::PrimaMateria => "prima_materia",
            Phase::Solutio => "solutio",
            Phase::Coagulatio => "coagulatio",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Phase {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prima_materia" | "prima-materia" | "prima" => Ok(Phase::PrimaMateria),
            "solutio" => Ok(Phase::Solutio),
            "coagulatio" => Ok(Phase::Coagulatio),
            other => Err(crate::Error::InvalidArgument(format!("unknown phase '{other}'"))),
        }
    }
}

/// Provider-reported and measured metadata for one generation call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Name of the provider that produced the prompt text.
    pub generation_provider: String,
    /// Model name used for generation.
    pub generation_model: String,
    /// Model used to embed the resulting prompt, if embedding ran.
    pub embedding_model: Option<String>,
    /// Wall-clock time spent on the provider call, in milliseconds.
    pub processing_ms: u64,
    /// Tokens consumed by the prompt sent to the provider.
    pub input_tokens: u32,
    /// Tokens produced by the provider's completion.
    pub output_tokens: u32,
    /// `input_tokens + output_tokens`.
    pub total_tokens: u32,
    /// Estimated cost in USD for this call.
    pub cost: f64,
}

/// A single refined prompt produced by one phase of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    /// Opaque identifier, stable for the prompt's lifetime.
    pub id: Uuid,
    /// Groups every prompt produced by one `generate` call.
    pub session_id: Uuid,
    /// The phase that produced this prompt.
    pub phase: Phase,
    /// Refined prompt text.
    pub content: String,
    /// The raw idea the user submitted, carried through every phase.
    pub original_input: String,
    /// Free-form tags attached at generation time or later.
    pub tags: HashSet<String>,
    /// Embedding vector, present once the embedding step has run.
    pub embedding: Option<Vec<f32>>,
    /// Name of the embedding model, present alongside `embedding`.
    pub embedding_model: Option<String>,
    /// Dimensionality of `embedding`, present alongside `embedding`.
    pub embedding_dim: Option<usize>,
    /// Provider and cost accounting for the call that produced this prompt.
    pub model_metadata: ModelMetadata,
    /// Sampling temperature the phase was generated at.
    pub temperature: f32,
    /// Token cap requested for the generation call.
    pub max_tokens: u32,
    /// Tokens the provider actually produced (`model_metadata.output_tokens`
    /// once the call returns); `0` before generation completes.
    pub actual_tokens: u32,
    /// Aggregate ranking score assigned by the ranker, if ranking ran.
    pub score: Option<f32>,
    /// In `cascade` composition, the chosen input text each prior phase
    /// contributed; preserved so a caller can reconstruct the chain.
    pub context_snippets: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Prompt {
    /// Builds a new prompt with fresh timestamps and no score or embedding.
    pub fn new(session_id: Uuid, phase: Phase, content: String, original_input: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            session_id,
            phase,
            content,
            original_input,
            tags: HashSet::new(),
            embedding: None,
            embedding_model: None,
            embedding_dim: None,
            model_metadata: ModelMetadata::default(),
            temperature: 0.7,
            max_tokens: 2048,
            actual_tokens: 0,
            score: None,
            context_snippets: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// The user's action on a prompt presented to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionAction {
    /// The prompt was selected for use.
    Chosen,
    /// The prompt was shown but not selected.
    Skipped,
}

impl fmt::Display for InteractionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InteractionAction::Chosen => "chosen",
            InteractionAction::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}

impl InteractionAction {
    /// Parses a string, falling back to `Skipped` for anything unrecognized.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "chosen" => InteractionAction::Chosen,
            _ => InteractionAction::Skipped,
        }
    }
}

/// A record of a user acting on a prompt; the raw material for learning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub id: Uuid,
    pub prompt_id: Uuid,
    pub session_id: Uuid,
    pub action: InteractionAction,
    /// Optional 1-5 explicit rating supplied alongside the action.
    pub rating: Option<u8>,
    pub created_at: DateTime<Utc>,
}

/// How one prompt relates to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// Produced by a later phase acting on the source prompt.
    DerivedFrom,
    /// Judged semantically close by the vector index.
    SimilarTo,
    /// The source prompt drew on the target without being derived from it.
    InspiredBy,
    /// Two or more prompts were combined into the source prompt.
    MergedWith,
    /// A meta-optimizer iteration of the source prompt.
    OptimizedFrom,
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelationshipKind::DerivedFrom => "derived_from",
            RelationshipKind::SimilarTo => "similar_to",
            RelationshipKind::InspiredBy => "inspired_by",
            RelationshipKind::MergedWith => "merged_with",
            RelationshipKind::OptimizedFrom => "optimized_from",
        };
        write!(f, "{s}")
    }
}

impl RelationshipKind {
    /// Parses a string, falling back to `SimilarTo` for anything unrecognized.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "derived_from" => RelationshipKind::DerivedFrom,
            "inspired_by" => RelationshipKind::InspiredBy,
            "merged_with" => RelationshipKind::MergedWith,
            "optimized_from" => RelationshipKind::OptimizedFrom,
            _ => RelationshipKind::SimilarTo,
        }
    }
}

/// A directed edge between two prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub id: Uuid,
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub kind: RelationshipKind,
    /// Cosine similarity or optimizer score, depending on `kind`.
    pub strength: f32,
    pub created_at: DateTime<Utc>,
}

/// A single per-use effectiveness record, written each time a prompt is
/// chosen (or otherwise acted on) in a generation session; the ranker's
/// `historical_score` and the nightly learning job both read these back
/// as a rolling average rather than a fixed aggregate counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageAnalytics {
    pub id: Uuid,
    pub prompt_id: Uuid,
    pub session_id: Uuid,
    /// Observed effectiveness of this use, in `[0, 1]`.
    pub effectiveness: f32,
    /// Optional explicit 1-5 rating supplied alongside the use.
    pub user_feedback: Option<u8>,
    /// Free-form note on the circumstances of this use.
    pub context: Option<String>,
    /// Whether this prompt was actually fed into a later generation call.
    pub used_in_generation: bool,
    pub generated_at: DateTime<Utc>,
}

/// Per-phase provider and sampling overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseConfig {
    pub phase: Phase,
    /// Provider name; `None` defers to the registry default.
    pub provider: Option<String>,
    /// Model name; `None` defers to the provider's default model.
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

/// The raw request for a prompt-generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// The user's raw idea.
    pub input: String,
    /// Phases to run, in order; defaults to all three.
    pub phases: Vec<Phase>,
    /// How many candidate prompts to produce per phase.
    pub count: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    pub tags: Vec<String>,
    /// Prior session to link this generation to, for context enhancement.
    pub session_id: Option<Uuid>,
}

impl Default for GenerateRequest {
    fn default() -> Self {
        Self {
            input: String::new(),
            phases: Phase::ALL.to_vec(),
            count: 1,
            temperature: 0.7,
            max_tokens: 2048,
            tags: Vec::new(),
            session_id: None,
        }
    }
}

/// How variants from multiple phases are composed into the final result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossPhaseMode {
    /// Every variant from every phase is returned.
    All,
    /// Per phase, the single best variant is picked and collected.
    Best,
    /// Per phase, the best variant's content feeds the next phase as input.
    Cascade,
}

impl Default for CrossPhaseMode {
    fn default() -> Self {
        CrossPhaseMode::Cascade
    }
}

impl fmt::Display for CrossPhaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CrossPhaseMode::All => "all",
            CrossPhaseMode::Best => "best",
            CrossPhaseMode::Cascade => "cascade",
        };
        write!(f, "{s}")
    }
}

impl FromStr for CrossPhaseMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(CrossPhaseMode::All),
            "best" => Ok(CrossPhaseMode::Best),
            "cascade" => Ok(CrossPhaseMode::Cascade),
            other => Err(crate::Error::InvalidArgument(format!("unknown cross_phase mode '{other}'"))),
        }
    }
}

/// Full set of knobs controlling one generation run, layered on top of
/// the bare request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateOptions {
    pub request: GenerateRequest,
    /// Per-phase overrides; phases not listed use the registry default.
    pub phase_configs: Vec<PhaseConfig>,
    /// How variants from multiple phases are composed into the result.
    pub cross_phase: CrossPhaseMode,
    /// Run independent phase branches concurrently where the pipeline
    /// shape allows it.
    pub use_parallel: bool,
    /// Enhance the input with related history before Prima Materia runs.
    pub include_context: bool,
    /// Optional persona string folded into every phase's system prompt.
    pub persona: Option<String>,
    /// Target model family the final prompt should be tuned for.
    pub target_model: Option<String>,
    /// Run the meta-prompt optimizer over the Coagulatio output.
    pub optimize: bool,
    /// Stop optimizing once the judge score reaches this value.
    pub optimize_target_score: Option<f32>,
    /// Hard cap on optimizer iterations regardless of score.
    pub optimize_max_iterations: Option<u32>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            request: GenerateRequest::default(),
            phase_configs: Vec::new(),
            cross_phase: CrossPhaseMode::default(),
            use_parallel: true,
            include_context: true,
            persona: None,
            target_model: None,
            optimize: false,
            optimize_target_score: None,
            optimize_max_iterations: None,
        }
    }
}

/// The five bounded features the ranker combines into a single score.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RankingFeatures {
    pub temperature_score: f32,
    pub token_score: f32,
    pub context_score: f32,
    pub length_score: f32,
    pub historical_score: f32,
}

/// Weights applied to `RankingFeatures`; always sums to `1.0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingWeights {
    pub temperature: f32,
    pub token: f32,
    pub semantic: f32,
    pub length: f32,
    pub historical: f32,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            token: 0.2,
            semantic: 0.3,
            length: 0.1,
            historical: 0.2,
        }
    }
}

impl RankingWeights {
    /// Combines `features` into a single score in `[0, 1]`.
    pub fn score(&self, features: &RankingFeatures) -> f32 {
        self.temperature * features.temperature_score
            + self.token * features.token_score
            + self.semantic * features.context_score
            + self.length * features.length_score
            + self.historical * features.historical_score
    }

    /// True if the five weights sum to `1.0` within floating-point slop.
    pub fn is_normalized(&self) -> bool {
        let sum = self.temperature + self.token + self.semantic + self.length + self.historical;
        (sum - 1.0).abs() < 1e-4
    }
}

/// Context gathered from prior sessions before Prima Materia runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnhancedContext {
    /// Ids of prior prompts judged similar to the new input.
    pub similar_prompt_ids: Vec<Uuid>,
    /// Short snippets pulled from those prompts, passed to the provider.
    pub snippets: Vec<String>,
}

/// The outcome of one `generate` call across every phase that ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub session_id: Uuid,
    /// All prompts produced, across every phase and candidate.
    pub prompts: Vec<Prompt>,
    /// Phases that failed after exhausting their provider fallback chain.
    pub phase_failures: Vec<String>,
}
