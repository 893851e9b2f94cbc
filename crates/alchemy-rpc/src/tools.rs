//! Typed per-tool request parsing and the static tool catalog returned
//! from `tools/list`.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{Error, Result};

pub const GENERATE_PROMPTS: &str = "generate_prompts";
pub const BATCH_GENERATE: &str = "batch_generate";
pub const SEARCH_PROMPTS: &str = "search_prompts";
pub const GET_PROMPT: &str = "get_prompt";
pub const OPTIMIZE_PROMPT: &str = "optimize_prompt";
pub const LIST_PROVIDERS: &str = "list_providers";
pub const TRACK_PROMPT_RELATIONSHIP: &str = "track_prompt_relationship";
pub const RECORD_INTERACTION: &str = "record_interaction";

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratePromptsArgs {
    pub input: String,
    #[serde(default)]
    pub phases: Vec<String>,
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default)]
    pub persona: Option<String>,
    #[serde(default = "default_phase_selection")]
    pub phase_selection: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub optimize: bool,
}

fn default_count() -> usize {
    1
}
fn default_phase_selection() -> String {
    "cascade".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2048
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchGenerateArgs {
    pub inputs: Vec<String>,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_workers() -> usize {
    4
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchPromptsArgs {
    pub query: String,
    #[serde(default = "default_search_limit")]
    pub limit: usize,
    #[serde(default)]
    pub semantic: bool,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_search_limit() -> usize {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetPromptArgs {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptimizePromptArgs {
    pub prompt: String,
    pub task: String,
    #[serde(default)]
    pub persona: Option<String>,
    #[serde(default)]
    pub target_model: Option<String>,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_target_score")]
    pub target_score: f32,
}

fn default_max_iterations() -> u32 {
    3
}
fn default_target_score() -> f32 {
    0.85
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackRelationshipArgs {
    pub src: String,
    pub tgt: String,
    pub kind: String,
    #[serde(default = "default_strength")]
    pub strength: f32,
    #[serde(default)]
    pub context: Option<String>,
}

fn default_strength() -> f32 {
    1.0
}

/// Args for recording a caller's eventual choice among prompts it was
/// shown, plus (optionally) the effectiveness that choice turned out to
/// have. Feeds the `interactions` table the learning job reads, and
/// `usage_analytics` when `effectiveness` is supplied.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordInteractionArgs {
    pub prompt_id: String,
    pub session_id: String,
    /// `"chosen"` or `"skipped"`.
    pub action: String,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub effectiveness: Option<f32>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub used_in_generation: bool,
}

pub fn parse_args<T: for<'de> Deserialize<'de>>(tool: &str, arguments: Value) -> Result<T> {
    serde_json::from_value(arguments).map_err(|e| Error::InvalidArguments { tool: tool.to_string(), reason: e.to_string() })
}

/// The `tools/list` catalog: name, description, and a minimal JSON-Schema
/// input description per tool.
pub fn catalog() -> Vec<Value> {
    vec![
        json!({
            "name": GENERATE_PROMPTS,
            "description": "Runs the three-phase generation pipeline over a raw idea and returns the ranked result.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "input": {"type": "string"},
                    "phases": {"type": "array", "items": {"type": "string"}},
                    "count": {"type": "integer", "minimum": 1},
                    "persona": {"type": "string"},
                    "phase_selection": {"type": "string", "enum": ["best", "cascade", "all"]},
                    "temperature": {"type": "number"},
                    "max_tokens": {"type": "integer"},
                    "optimize": {"type": "boolean"}
                },
                "required": ["input"]
            }
        }),
        json!({
            "name": BATCH_GENERATE,
            "description": "Fans out generation across a bounded worker pool for a list of inputs.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "inputs": {"type": "array", "items": {"type": "string"}},
                    "workers": {"type": "integer", "minimum": 1, "maximum": 20}
                },
                "required": ["inputs"]
            }
        }),
        json!({
            "name": SEARCH_PROMPTS,
            "description": "Searches stored prompts, semantically or by filter.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "limit": {"type": "integer"},
                    "semantic": {"type": "boolean"},
                    "session_id": {"type": "string"},
                    "tags": {"type": "array", "items": {"type": "string"}}
                },
                "required": ["query"]
            }
        }),
        json!({
            "name": GET_PROMPT,
            "description": "Returns one prompt with full metadata.",
            "inputSchema": {
                "type": "object",
                "properties": {"id": {"type": "string"}},
                "required": ["id"]
            }
        }),
        json!({
            "name": OPTIMIZE_PROMPT,
            "description": "Iteratively refines a prompt against a judge until the target score or iteration cap is hit.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "prompt": {"type": "string"},
                    "task": {"type": "string"},
                    "persona": {"type": "string"},
                    "target_model": {"type": "string"},
                    "max_iterations": {"type": "integer"},
                    "target_score": {"type": "number"}
                },
                "required": ["prompt", "task"]
            }
        }),
        json!({
            "name": LIST_PROVIDERS,
            "description": "Returns a snapshot of registered providers and the current fallback order.",
            "inputSchema": {"type": "object", "properties": {}}
        }),
        json!({
            "name": TRACK_PROMPT_RELATIONSHIP,
            "description": "Records a relationship edge between two stored prompts.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "src": {"type": "string"},
                    "tgt": {"type": "string"},
                    "kind": {"type": "string", "enum": ["derived_from", "similar_to", "inspired_by", "merged_with", "optimized_from"]},
                    "strength": {"type": "number"},
                    "context": {"type": "string"}
                },
                "required": ["src", "tgt", "kind"]
            }
        }),
        json!({
            "name": RECORD_INTERACTION,
            "description": "Records the caller's chosen/skipped action on a shown prompt, and optionally the effectiveness that choice had.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "prompt_id": {"type": "string"},
                    "session_id": {"type": "string"},
                    "action": {"type": "string", "enum": ["chosen", "skipped"]},
                    "rating": {"type": "integer", "minimum": 1, "maximum": 5},
                    "effectiveness": {"type": "number", "minimum": 0, "maximum": 1},
                    "context": {"type": "string"},
                    "used_in_generation": {"type": "boolean"}
                },
                "required": ["prompt_id", "session_id", "action"]
            }
        }),
    ]
}
