//! Request handlers for `/api/v1/*`, `/health`, and `/metrics` (§4.9, §6).

use alchemy_core::{CrossPhaseMode, GenerateOptions, GenerateRequest, Phase, RankingWeights};
use alchemy_engine::{Judge, JudgeCriteria};
use alchemy_storage::SearchFilter;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::error::{ApiError, ApiResult};
use super::state::AppState;
use crate::metrics::Timer;

#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    pub input: String,
    #[serde(default)]
    pub phases: Vec<String>,
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default = "default_phase_selection")]
    pub phase_selection: String,
    #[serde(default)]
    pub persona: Option<String>,
    #[serde(default)]
    pub target_model: Option<String>,
    #[serde(default = "default_true")]
    pub use_parallel: bool,
    #[serde(default = "default_true")]
    pub include_context: bool,
    #[serde(default)]
    pub optimize: bool,
    #[serde(default)]
    pub optimize_target_score: Option<f32>,
    #[serde(default)]
    pub optimize_max_iterations: Option<u32>,
}

fn default_count() -> usize {
    1
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_true() -> bool {
    true
}
fn default_phase_selection() -> String {
    "all".to_string()
}

/// `POST /api/v1/prompts/generate` — runs §4.3's full pipeline and
/// returns the resulting `GenerationResult`.
pub async fn generate(State(state): State<AppState>, Json(body): Json<GenerateBody>) -> ApiResult<Json<Value>> {
    let _permit = state.generation_limiter.acquire().await.map_err(|_| {
        ApiError::from(alchemy_core::Error::Internal("generation limiter closed".to_string()))
    })?;

    let phases = if body.phases.is_empty() {
        Phase::ALL.to_vec()
    } else {
        body.phases
            .iter()
            .map(|p| p.parse::<Phase>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(ApiError::from)?
    };
    let cross_phase = body.phase_selection.parse::<CrossPhaseMode>().map_err(ApiError::from)?;

    let options = GenerateOptions {
        request: GenerateRequest {
            input: body.input,
            phases,
            count: body.count.max(1),
            temperature: body.temperature,
            max_tokens: body.max_tokens,
            tags: body.tags,
            session_id: body.session_id,
        },
        phase_configs: Vec::new(),
        cross_phase,
        use_parallel: body.use_parallel,
        include_context: body.include_context,
        persona: body.persona,
        target_model: body.target_model,
        optimize: body.optimize,
        optimize_target_score: body.optimize_target_score,
        optimize_max_iterations: body.optimize_max_iterations,
    };

    let timer = Timer::start();
    let result = state.engine.generate(&options, &CancellationToken::new()).await;
    timer.observe(&state.metrics.generation_latency_ms);
    state.metrics.http_requests_total.inc();

    match result {
        Ok(result) => Ok(Json(serde_json::to_value(result).map_err(|e| ApiError::from(alchemy_core::Error::from(e)))?)),
        Err(e) => {
            state.metrics.http_requests_failed_total.inc();
            Err(ApiError::from(e))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchBody {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub semantic: bool,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub filters: SearchFiltersBody,
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchFiltersBody {
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// `POST /api/v1/prompts/search` — semantic or filtered search (§4.2).
/// Returns `{prompt, similarity}` pairs for semantic search (the Open
/// Question recorded in DESIGN.md resolves in favor of exposing scores),
/// or a bare prompt list for filtered search.
pub async fn search(State(state): State<AppState>, Json(body): Json<SearchBody>) -> ApiResult<Json<Value>> {
    let phase = body.filters.phase.as_deref().map(|p| p.parse::<Phase>()).transpose().map_err(ApiError::from)?;
    let filter = SearchFilter { session_id: body.filters.session_id, phase, tags: body.filters.tags };

    if body.semantic {
        let embedder = state.providers.embedder().ok_or_else(|| {
            ApiError::from(alchemy_core::Error::InvalidArgument(
                "semantic search requested but no embedding provider is configured".to_string(),
            ))
        })?;
        let query_embedding = embedder.embed(&body.query).await.map_err(ApiError::from)?;
        let hits = state.storage.semantic_search(&query_embedding, body.limit, &filter).await.map_err(ApiError::from)?;
        let data: Vec<Value> =
            hits.into_iter().map(|h| json!({"prompt": h.prompt, "similarity": h.similarity})).collect();
        return Ok(Json(Value::Array(data)));
    }

    let mut prompts = state.storage.filtered_prompts(&filter, body.limit).await.map_err(ApiError::from)?;
    if !body.query.is_empty() {
        let needle = body.query.to_lowercase();
        prompts.retain(|p| p.content.to_lowercase().contains(&needle));
    }
    Ok(Json(serde_json::to_value(prompts).map_err(|e| ApiError::from(alchemy_core::Error::from(e)))?))
}

/// `GET /api/v1/prompts/{id}`.
pub async fn get_prompt(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Value>> {
    match state.storage.get_prompt(id).await.map_err(ApiError::from)? {
        Some(prompt) => Ok(Json(serde_json::to_value(prompt).map_err(|e| ApiError::from(alchemy_core::Error::from(e)))?)),
        None => Err(ApiError::from(alchemy_core::Error::NotFound(format!("no prompt found with id '{id}'")))),
    }
}

#[derive(Debug, Deserialize)]
pub struct SelectBody {
    pub prompt_ids: Vec<Uuid>,
    #[serde(default)]
    pub criteria: SelectCriteriaBody,
    /// Session the selection belongs to, for the recorded interactions.
    /// Defaults to a fresh id when omitted, so skipped/chosen rows stay
    /// attributable even for one-off selections.
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SelectCriteriaBody {
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub persona: Option<String>,
    #[serde(default)]
    pub desired_qualities: Vec<String>,
    #[serde(default)]
    pub max_length: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SelectResponse {
    pub selected_id: Option<Uuid>,
    pub scores: Vec<ScoredCandidate>,
}

#[derive(Debug, Serialize)]
pub struct ScoredCandidate {
    pub prompt_id: Uuid,
    pub score: f32,
    pub reasoning: String,
}

/// `POST /api/v1/prompts/select` — AI-judged selection (§4.5) among an
/// explicit set of already-stored candidates.
pub async fn select(State(state): State<AppState>, Json(body): Json<SelectBody>) -> ApiResult<Json<SelectResponse>> {
    let candidates = state.storage.get_prompts_by_ids(&body.prompt_ids).await.map_err(ApiError::from)?;
    if candidates.is_empty() {
        return Ok(Json(SelectResponse { selected_id: None, scores: Vec::new() }));
    }

    let criteria = JudgeCriteria {
        task: body.criteria.task,
        persona: body.criteria.persona,
        desired_qualities: body.criteria.desired_qualities,
        max_length: body.criteria.max_length,
    };
    let original_input = candidates[0].original_input.clone();

    let judge = Judge::new(state.providers.clone()).with_weights(RankingWeights::default());
    let scores = judge.score_candidates(&candidates, &criteria, &original_input).await;
    let selected = judge.select_best(&candidates, &criteria, &original_input).await;
    let selected_id = selected.map(|p| p.id);

    let session_id = body.session_id.unwrap_or_else(Uuid::new_v4);
    for candidate in &candidates {
        let action = if Some(candidate.id) == selected_id {
            alchemy_core::InteractionAction::Chosen
        } else {
            alchemy_core::InteractionAction::Skipped
        };
        let interaction = alchemy_core::Interaction {
            id: Uuid::new_v4(),
            prompt_id: candidate.id,
            session_id,
            action,
            rating: None,
            created_at: chrono::Utc::now(),
        };
        if let Err(e) = state.storage.insert_interaction(&interaction).await {
            tracing::warn!(error = %e, prompt_id = %candidate.id, "failed to record selection interaction");
        }
    }

    Ok(Json(SelectResponse {
        selected_id,
        scores: scores
            .into_iter()
            .filter_map(|s| candidates.get(s.index).map(|c| ScoredCandidate { prompt_id: c.id, score: s.score, reasoning: s.reasoning }))
            .collect(),
    }))
}

/// `GET /api/v1/providers` — registry snapshot.
pub async fn providers(State(state): State<AppState>) -> Json<Value> {
    let mut out = Vec::new();
    for name in state.providers.list() {
        let Some(provider) = state.providers.get(name) else { continue };
        out.push(json!({
            "name": provider.name(),
            "default_model": provider.default_model(),
            "available_models": provider.available_models(),
            "is_available": provider.is_available().await,
        }));
    }
    let embedder = state.providers.embedder().map(|e| json!({"name": e.name(), "model": e.model(), "dimensions": e.dimensions()}));
    Json(json!({"providers": out, "embedder": embedder}))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}

/// `GET /health` — 200 with `status: "healthy"` while storage answers
/// and at least one completion provider is available; `"degraded"`
/// otherwise, still 200 (§4.9 doesn't ask for a non-200 status here).
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let storage_ok = state.storage.prompt_count().await.is_ok();

    let mut any_provider_available = false;
    for name in state.providers.list() {
        if let Some(provider) = state.providers.get(name) {
            if provider.is_available().await {
                any_provider_available = true;
                break;
            }
        }
    }

    let status = if storage_ok && any_provider_available { "healthy" } else { "degraded" };
    Json(HealthResponse { status, version: env!("CARGO_PKG_VERSION"), uptime_secs: state.started_at.elapsed().as_secs() })
}

#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: &'static str,
    pub detail: Value,
}

#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub components: std::collections::BTreeMap<&'static str, ComponentHealth>,
}

/// `GET /health/detailed` — per-component breakdown backing `/health`'s
/// single status: storage reachability, how many providers the registry
/// currently has registered, and how stale the ranker weights file is.
pub async fn health_detailed(State(state): State<AppState>) -> Json<DetailedHealthResponse> {
    let mut components = std::collections::BTreeMap::new();
    let mut overall_healthy = true;

    let storage_count = state.storage.prompt_count().await;
    let storage_ok = storage_count.is_ok();
    overall_healthy &= storage_ok;
    components.insert(
        "storage",
        ComponentHealth {
            status: if storage_ok { "healthy" } else { "unreachable" },
            detail: json!({"prompt_count": storage_count.ok()}),
        },
    );

    let provider_count = state.providers.list().len();
    let providers_ok = provider_count > 0;
    overall_healthy &= providers_ok;
    components.insert(
        "providers",
        ComponentHealth {
            status: if providers_ok { "healthy" } else { "none_registered" },
            detail: json!({"registered": provider_count}),
        },
    );

    let weights_path = state.config.ranker_weights_path();
    let weights_detail = match std::fs::metadata(&weights_path).and_then(|m| m.modified()) {
        Ok(modified) => {
            let age_secs = modified.elapsed().map(|d| d.as_secs()).unwrap_or(0);
            components.insert(
                "ranker_weights",
                ComponentHealth { status: "healthy", detail: json!({"path": weights_path, "age_secs": age_secs}) },
            );
            None
        }
        Err(e) => Some(e),
    };
    if let Some(e) = weights_detail {
        components.insert(
            "ranker_weights",
            ComponentHealth {
                status: "missing",
                detail: json!({"path": weights_path, "error": e.to_string()}),
            },
        );
    }

    let status = if overall_healthy { "healthy" } else { "degraded" };
    Json(DetailedHealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        components,
    })
}

/// `GET /metrics` — Prometheus text exposition format.
pub async fn metrics(State(state): State<AppState>) -> String {
    state.metrics.export_prometheus()
}
