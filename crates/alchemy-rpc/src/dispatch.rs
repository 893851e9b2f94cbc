//! Maps `tools/call` requests onto the engine, storage, and provider
//! registry. Every branch is infallible at this layer: a failure inside
//! a tool becomes `ToolResult::error`, never a JSON-RPC error object, so
//! protocol-level codes stay reserved for protocol-level faults.

use std::sync::Arc;

use alchemy_core::{
    CrossPhaseMode, GenerateOptions, GenerateRequest, Interaction, InteractionAction, Phase,
    Relationship, RelationshipKind, UsageAnalytics,
};
use alchemy_engine::{CriteriaWeights, OptimizationRequest, Optimizer, PhaseEngine};
use alchemy_providers::ProviderRegistry;
use alchemy_storage::{SearchFilter, Store};
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::batch;
use crate::error::{Error, Result};
use crate::protocol::{progress_notification, JsonRpcNotification, ProgressKind, ProgressPayload, ToolResult};
use crate::tools::{
    self, BatchGenerateArgs, GeneratePromptsArgs, GetPromptArgs, OptimizePromptArgs, RecordInteractionArgs,
    SearchPromptsArgs, TrackRelationshipArgs, BATCH_GENERATE, GENERATE_PROMPTS, GET_PROMPT, LIST_PROVIDERS,
    OPTIMIZE_PROMPT, RECORD_INTERACTION, SEARCH_PROMPTS, TRACK_PROMPT_RELATIONSHIP,
};

/// Shared handles a `Dispatcher` needs; constructed once at startup and
/// cloned cheaply per request.
#[derive(Clone)]
pub struct DispatcherDeps {
    pub engine: Arc<PhaseEngine>,
    pub storage: Arc<Store>,
    pub providers: Arc<ProviderRegistry>,
}

/// Sends `$/progress` notifications for one in-flight `tools/call`, if
/// the caller supplied a `progressToken`.
#[derive(Clone)]
pub struct ProgressNotifier {
    pub token: Value,
    pub sender: UnboundedSender<JsonRpcNotification>,
}

impl ProgressNotifier {
    fn send(&self, payload: ProgressPayload) {
        let _ = self.sender.send(progress_notification(&self.token, payload));
    }

    fn begin(&self, title: &str) {
        self.send(ProgressPayload {
            kind: ProgressKind::Begin,
            title: Some(title.to_string()),
            message: None,
            percentage: Some(0.0),
            cancellable: Some(false),
        });
    }

    fn report(&self, completed: usize, total: usize) {
        let percentage = if total == 0 { 100.0 } else { (completed as f32 / total as f32) * 100.0 };
        self.send(ProgressPayload {
            kind: ProgressKind::Report,
            title: None,
            message: Some(format!("{completed}/{total}")),
            percentage: Some(percentage),
            cancellable: Some(false),
        });
    }

    fn end(&self) {
        self.send(ProgressPayload {
            kind: ProgressKind::End,
            title: None,
            message: None,
            percentage: Some(100.0),
            cancellable: Some(false),
        });
    }
}

pub struct Dispatcher {
    deps: DispatcherDeps,
}

impl Dispatcher {
    pub fn new(deps: DispatcherDeps) -> Self {
        Self { deps }
    }

    /// Executes one named tool against `arguments`, returning the
    /// `ToolResult` that becomes the `result` field of the JSON-RPC
    /// response. `notifier` is only consulted by `batch_generate`.
    pub async fn call_tool(&self, name: &str, arguments: Value, notifier: Option<ProgressNotifier>) -> ToolResult {
        let outcome = match name {
            GENERATE_PROMPTS => self.generate_prompts(arguments).await,
            BATCH_GENERATE => self.batch_generate(arguments, notifier).await,
            SEARCH_PROMPTS => self.search_prompts(arguments).await,
            GET_PROMPT => self.get_prompt(arguments).await,
            OPTIMIZE_PROMPT => self.optimize_prompt(arguments).await,
            LIST_PROVIDERS => self.list_providers().await,
            TRACK_PROMPT_RELATIONSHIP => self.track_relationship(arguments).await,
            RECORD_INTERACTION => self.record_interaction(arguments).await,
            other => Err(Error::UnknownTool(other.to_string())),
        };

        match outcome {
            Ok(result) => result,
            Err(e) => ToolResult::error(e.to_string()),
        }
    }

    async fn generate_prompts(&self, arguments: Value) -> Result<ToolResult> {
        let args: GeneratePromptsArgs = tools::parse_args(GENERATE_PROMPTS, arguments)?;

        let phases = args
            .phases
            .iter()
            .map(|p| p.parse::<Phase>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::InvalidArguments { tool: GENERATE_PROMPTS.to_string(), reason: e.to_string() })?;
        let cross_phase = args
            .phase_selection
            .parse::<CrossPhaseMode>()
            .map_err(|e| Error::InvalidArguments { tool: GENERATE_PROMPTS.to_string(), reason: e.to_string() })?;

        let options = GenerateOptions {
            request: GenerateRequest {
                input: args.input,
                phases,
                count: args.count.max(1),
                temperature: args.temperature,
                max_tokens: args.max_tokens,
                tags: Vec::new(),
                session_id: None,
            },
            phase_configs: Vec::new(),
            cross_phase,
            use_parallel: true,
            include_context: true,
            persona: args.persona,
            target_model: None,
            optimize: args.optimize,
            optimize_target_score: None,
            optimize_max_iterations: None,
        };

        let result = self.deps.engine.generate(&options, &CancellationToken::new()).await?;
        Ok(ToolResult::data(serde_json::to_value(result)?))
    }

    async fn batch_generate(&self, arguments: Value, notifier: Option<ProgressNotifier>) -> Result<ToolResult> {
        let args: BatchGenerateArgs = tools::parse_args(BATCH_GENERATE, arguments)?;
        let total = args.inputs.len();

        if let Some(n) = &notifier {
            n.begin("batch_generate");
        }
        let progress_sink = notifier.clone();

        let report = batch::run_batch(
            self.deps.engine.clone(),
            args.inputs,
            args.workers,
            |input| GenerateOptions {
                request: GenerateRequest { input: input.to_string(), ..GenerateRequest::default() },
                ..GenerateOptions::default()
            },
            move |completed, total| {
                if let Some(n) = &progress_sink {
                    n.report(completed, total);
                }
            },
            CancellationToken::new(),
        )
        .await;

        if let Some(n) = &notifier {
            n.end();
        }

        Ok(ToolResult::data(json!({
            "total": total,
            "succeeded": report.successes.len(),
            "failed": report.errors.len(),
            "results": report.successes,
            "errors": report.errors.iter().map(|(i, input, err)| json!({
                "index": i, "input": input, "error": err,
            })).collect::<Vec<_>>(),
        })))
    }

    async fn search_prompts(&self, arguments: Value) -> Result<ToolResult> {
        let args: SearchPromptsArgs = tools::parse_args(SEARCH_PROMPTS, arguments)?;
        let session_id = args
            .session_id
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|e| Error::InvalidArguments { tool: SEARCH_PROMPTS.to_string(), reason: e.to_string() })?;
        let filter = SearchFilter { session_id, phase: None, tags: args.tags };

        if args.semantic {
            let embedder = self
                .deps
                .providers
                .embedder()
                .ok_or_else(|| Error::InvalidArguments {
                    tool: SEARCH_PROMPTS.to_string(),
                    reason: "semantic search requested but no embedding provider is configured".to_string(),
                })?;
            let query_embedding = embedder.embed(&args.query).await?;
            let hits = self.deps.storage.semantic_search(&query_embedding, args.limit, &filter).await?;
            let data = hits
                .into_iter()
                .map(|h| json!({"prompt": h.prompt, "similarity": h.similarity}))
                .collect::<Vec<_>>();
            return Ok(ToolResult::data(Value::Array(data)));
        }

        let mut prompts = self.deps.storage.filtered_prompts(&filter, args.limit).await?;
        if !args.query.is_empty() {
            let needle = args.query.to_lowercase();
            prompts.retain(|p| p.content.to_lowercase().contains(&needle));
        }
        Ok(ToolResult::data(serde_json::to_value(prompts)?))
    }

    async fn get_prompt(&self, arguments: Value) -> Result<ToolResult> {
        let args: GetPromptArgs = tools::parse_args(GET_PROMPT, arguments)?;
        let id = Uuid::parse_str(&args.id)
            .map_err(|e| Error::InvalidArguments { tool: GET_PROMPT.to_string(), reason: e.to_string() })?;
        match self.deps.storage.get_prompt(id).await? {
            Some(prompt) => Ok(ToolResult::data(serde_json::to_value(prompt)?)),
            None => Ok(ToolResult::error(format!("no prompt found with id '{id}'"))),
        }
    }

    async fn optimize_prompt(&self, arguments: Value) -> Result<ToolResult> {
        let args: OptimizePromptArgs = tools::parse_args(OPTIMIZE_PROMPT, arguments)?;
        let optimizer = Optimizer::new(self.deps.providers.clone())
            .with_storage(self.deps.storage.clone())
            .with_weights(CriteriaWeights::default());

        let request = OptimizationRequest {
            original_prompt: args.prompt,
            task: args.task,
            constraints: Vec::new(),
            model_family: args.target_model,
            persona: args.persona,
            max_iterations: args.max_iterations,
            target_score: args.target_score,
            session_id: None,
        };

        let result = optimizer.optimize(&request, &CancellationToken::new()).await?;
        Ok(ToolResult::data(json!({
            "original_score": result.original_score,
            "final_score": result.final_score,
            "improvement": result.improvement,
            "best_content": result.best_content,
            "iterations": result.iterations.iter().map(|it| json!({
                "iteration": it.iteration,
                "content": it.content,
                "score": it.score,
                "accepted": it.accepted,
            })).collect::<Vec<_>>(),
        })))
    }

    async fn list_providers(&self) -> Result<ToolResult> {
        let mut out = Vec::new();
        for name in self.deps.providers.list() {
            let Some(provider) = self.deps.providers.get(name) else { continue };
            out.push(json!({
                "name": provider.name(),
                "default_model": provider.default_model(),
                "available_models": provider.available_models(),
                "is_available": provider.is_available().await,
            }));
        }
        let embedder = self.deps.providers.embedder().map(|e| {
            json!({"name": e.name(), "model": e.model(), "dimensions": e.dimensions()})
        });
        Ok(ToolResult::data(json!({"providers": out, "embedder": embedder})))
    }

    async fn track_relationship(&self, arguments: Value) -> Result<ToolResult> {
        let args: TrackRelationshipArgs = tools::parse_args(TRACK_PROMPT_RELATIONSHIP, arguments)?;
        let source_id = Uuid::parse_str(&args.src)
            .map_err(|e| Error::InvalidArguments { tool: TRACK_PROMPT_RELATIONSHIP.to_string(), reason: e.to_string() })?;
        let target_id = Uuid::parse_str(&args.tgt)
            .map_err(|e| Error::InvalidArguments { tool: TRACK_PROMPT_RELATIONSHIP.to_string(), reason: e.to_string() })?;
        let kind = match args.kind.as_str() {
            "derived_from" => RelationshipKind::DerivedFrom,
            "similar_to" => RelationshipKind::SimilarTo,
            "inspired_by" => RelationshipKind::InspiredBy,
            "merged_with" => RelationshipKind::MergedWith,
            "optimized_from" => RelationshipKind::OptimizedFrom,
            other => {
                return Err(Error::InvalidArguments {
                    tool: TRACK_PROMPT_RELATIONSHIP.to_string(),
                    reason: format!("unknown relationship kind '{other}'"),
                })
            }
        };

        let relationship = Relationship {
            id: Uuid::new_v4(),
            source_id,
            target_id,
            kind,
            strength: args.strength,
            created_at: chrono::Utc::now(),
        };
        self.deps.storage.track_relationship(&relationship).await?;
        Ok(ToolResult::data(json!({"id": relationship.id})))
    }

    async fn record_interaction(&self, arguments: Value) -> Result<ToolResult> {
        let args: RecordInteractionArgs = tools::parse_args(RECORD_INTERACTION, arguments)?;
        let prompt_id = Uuid::parse_str(&args.prompt_id)
            .map_err(|e| Error::InvalidArguments { tool: RECORD_INTERACTION.to_string(), reason: e.to_string() })?;
        let session_id = Uuid::parse_str(&args.session_id)
            .map_err(|e| Error::InvalidArguments { tool: RECORD_INTERACTION.to_string(), reason: e.to_string() })?;
        let action = match args.action.as_str() {
            "chosen" => InteractionAction::Chosen,
            "skipped" => InteractionAction::Skipped,
            other => {
                return Err(Error::InvalidArguments {
                    tool: RECORD_INTERACTION.to_string(),
                    reason: format!("unknown interaction action '{other}'"),
                })
            }
        };

        let interaction = Interaction {
            id: Uuid::new_v4(),
            prompt_id,
            session_id,
            action,
            rating: args.rating,
            created_at: chrono::Utc::now(),
        };
        self.deps.storage.insert_interaction(&interaction).await?;

        if let Some(effectiveness) = args.effectiveness {
            let usage = UsageAnalytics {
                id: Uuid::new_v4(),
                prompt_id,
                session_id,
                effectiveness,
                user_feedback: args.rating,
                context: args.context,
                used_in_generation: args.used_in_generation,
                generated_at: chrono::Utc::now(),
            };
            self.deps.storage.record_usage(&usage).await?;
        }

        Ok(ToolResult::data(json!({"interaction_id": interaction.id})))
    }
}
