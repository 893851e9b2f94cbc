//! Orchestrates the three-phase generation pipeline: optional history
//! enhancement, per-phase fan-out, cross-phase composition, embedding,
//! optional meta-optimization, and final ranking.

mod enhancement;
mod templates;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Instant;

use alchemy_core::{
    CrossPhaseMode, GenerateOptions, GenerationResult, ModelMetadata, Phase, PhaseConfig, Prompt,
    RankingWeights,
};
use alchemy_providers::{CompletionRequest, Message, ProviderRegistry};
use alchemy_storage::Store;
use futures::future::join_all;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::judge::{Judge, JudgeCriteria};
use crate::optimizer::{OptimizationRequest, Optimizer};
use crate::ranker;

pub struct PhaseEngine {
    providers: Arc<ProviderRegistry>,
    storage: Option<Arc<Store>>,
    weights: Arc<RwLock<RankingWeights>>,
}

impl PhaseEngine {
    pub fn new(providers: Arc<ProviderRegistry>) -> Self {
        Self { providers, storage: None, weights: Arc::new(RwLock::new(RankingWeights::default())) }
    }

    pub fn with_storage(mut self, storage: Arc<Store>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_weights(mut self, weights: RankingWeights) -> Self {
        self.weights = Arc::new(RwLock::new(weights));
        self
    }

    /// Replaces the ranker weights this engine uses, without reconstructing
    /// it — the shape the learning engine (§4.7) needs for a hot reload.
    pub async fn set_weights(&self, weights: RankingWeights) {
        *self.weights.write().await = weights;
    }

    pub async fn generate(
        &self,
        options: &GenerateOptions,
        cancellation: &CancellationToken,
    ) -> Result<GenerationResult> {
        if cancellation.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let session_id = options.request.session_id.unwrap_or_else(uuid::Uuid::new_v4);
        let phases = if options.request.phases.is_empty() { Phase::ALL.to_vec() } else { options.request.phases.clone() };

        let base_input = self.enhance_if_requested(options, session_id).await;
        let mut phase_failures: Vec<String> = Vec::new();

        let mut result_prompts = if options.cross_phase == CrossPhaseMode::All && options.use_parallel {
            self.run_phases_concurrently(&phases, &base_input, options, session_id, &mut phase_failures, cancellation).await
        } else {
            self.run_phases_sequentially(&phases, &base_input, options, session_id, &mut phase_failures, cancellation).await
        };

        if result_prompts.is_empty() {
            return Err(Error::GenerationFailed);
        }

        if options.optimize {
            result_prompts = self.optimize_selected(result_prompts, options, session_id, cancellation).await;
        }

        let weights = self.weights.read().await.clone();
        let original_embedding = self.embed_for_ranking(&base_input).await;
        let historical = self.fetch_historical(&result_prompts).await;
        result_prompts = ranker::rank(&weights, result_prompts, &base_input, original_embedding.as_deref(), |id| {
            historical.get(&id).cloned()
        });

        if let Some(storage) = &self.storage {
            for prompt in &result_prompts {
                if let Err(e) = storage.insert_prompt(prompt).await {
                    warn!(error = %e, "failed to persist generated prompt");
                }
            }
        }

        Ok(GenerationResult { session_id, prompts: result_prompts, phase_failures })
    }

    async fn run_phases_concurrently(
        &self,
        phases: &[Phase],
        base_input: &str,
        options: &GenerateOptions,
        session_id: uuid::Uuid,
        phase_failures: &mut Vec<String>,
        cancellation: &CancellationToken,
    ) -> Vec<Prompt> {
        let futures = phases.iter().map(|phase| self.run_phase(*phase, base_input, options, session_id, cancellation));
        let mut out = Vec::new();
        for (phase, outcome) in phases.iter().zip(join_all(futures).await) {
            match outcome {
                Ok(variants) => out.extend(variants),
                Err(e) => {
                    warn!(phase = %phase, error = %e, "phase failed");
                    phase_failures.push(phase.to_string());
                }
            }
        }
        out
    }

    /// Runs phases in declared order. For `best`/`cascade`, each phase's
    /// winner (per §4.5) is the one collected into the result; `cascade`
    /// additionally feeds that winner's content forward as the next
    /// phase's input and records the chain on `context_snippets`.
    async fn run_phases_sequentially(
        &self,
        phases: &[Phase],
        base_input: &str,
        options: &GenerateOptions,
        session_id: uuid::Uuid,
        phase_failures: &mut Vec<String>,
        cancellation: &CancellationToken,
    ) -> Vec<Prompt> {
        let judge = self.judge();
        let criteria = selection_criteria(options);
        let mut current_input = base_input.to_string();
        let mut chain: Vec<String> = Vec::new();
        let mut collected = Vec::new();

        for phase in phases {
            if cancellation.is_cancelled() {
                phase_failures.push(phase.to_string());
                break;
            }
            match self.run_phase(*phase, &current_input, options, session_id, cancellation).await {
                Ok(variants) if options.cross_phase == CrossPhaseMode::All => collected.extend(variants),
                Ok(variants) => {
                    let Some(winner) = judge.select_best(&variants, &criteria, base_input, cancellation).await else {
                        continue;
                    };
                    let mut winner = winner.clone();
                    if options.cross_phase == CrossPhaseMode::Cascade {
                        chain.push(current_input.clone());
                        winner.context_snippets = chain.clone();
                    }
                    current_input = winner.content.clone();
                    collected.push(winner);
                }
                Err(e) => {
                    warn!(phase = %phase, error = %e, "phase failed, continuing with last input");
                    phase_failures.push(phase.to_string());
                }
            }
        }
        collected
    }

    /// Pre-fetches usage analytics for each prompt so the (synchronous)
    /// ranker can score `historical_score` without itself needing
    /// to await storage per candidate.
    async fn fetch_historical(&self, prompts: &[Prompt]) -> std::collections::HashMap<uuid::Uuid, f32> {
        let mut out = std::collections::HashMap::new();
        let Some(storage) = &self.storage else { return out };
        for prompt in prompts {
            if let Ok(Some(effectiveness)) = storage.average_effectiveness(prompt.id).await {
                out.insert(prompt.id, effectiveness);
            }
        }
        out
    }

    async fn embed_for_ranking(&self, input: &str) -> Option<Vec<f32>> {
        let embedder = self.providers.embedder()?;
        embedder.embed(input).await.ok()
    }

    async fn enhance_if_requested(&self, options: &GenerateOptions, session_id: uuid::Uuid) -> String {
        let input = &options.request.input;
        if !options.include_context {
            return input.clone();
        }
        let (Some(storage), Some(embedder)) = (&self.storage, self.providers.embedder()) else {
            return input.clone();
        };

        match enhancement::enhance(storage, &embedder, input, Some(session_id)).await {
            Some(context) if !context.snippets.is_empty() => {
                debug!(similar = context.similar_prompt_ids.len(), "history enhancement produced context");
                format!("{}\n\n[Relevant history]\n{}", input, context.snippets.join("\n"))
            }
            _ => input.clone(),
        }
    }

    async fn run_phase(
        &self,
        phase: Phase,
        current_input: &str,
        options: &GenerateOptions,
        session_id: uuid::Uuid,
        cancellation: &CancellationToken,
    ) -> Result<Vec<Prompt>> {
        let config = phase_config(options, phase);
        let count = options.request.count.max(1);
        let temperature = config.temperature.unwrap_or(options.request.temperature);

        let (system, user) = templates::render(
            phase,
            current_input,
            options.persona.as_deref(),
            options.target_model.as_deref(),
            None,
        );

        let mut variants = Vec::with_capacity(count);
        for _ in 0..count {
            let started = Instant::now();
            let request = CompletionRequest::new(
                config.model.clone().unwrap_or_default(),
                vec![Message::system(system.clone()), Message::user(user.clone())],
            )
            .with_temperature(temperature)
            .with_max_tokens(options.request.max_tokens);

            let response =
                self.providers.complete_with_fallback(config.provider.as_deref(), request, cancellation).await?;

            if response.content.trim().is_empty() {
                return Err(Error::PhaseFailed { phase: phase.to_string(), reason: "empty completion".into() });
            }

            let mut prompt = Prompt::new(session_id, phase, response.content.clone(), options.request.input.clone());
            prompt.tags = options.request.tags.iter().cloned().collect();
            prompt.temperature = temperature;
            prompt.max_tokens = options.request.max_tokens;
            prompt.actual_tokens = response.usage.map(|u| u.completion_tokens).unwrap_or(0);
            prompt.model_metadata = ModelMetadata {
                generation_provider: config.provider.clone().unwrap_or_else(|| "auto".to_string()),
                generation_model: response.model.clone(),
                embedding_model: None,
                processing_ms: started.elapsed().as_millis() as u64,
                input_tokens: response.usage.map(|u| u.prompt_tokens).unwrap_or(0),
                output_tokens: response.usage.map(|u| u.completion_tokens).unwrap_or(0),
                total_tokens: response.usage.map(|u| u.total_tokens).unwrap_or(0),
                cost: 0.0,
            };

            self.embed_if_possible(&mut prompt).await;
            variants.push(prompt);
        }

        Ok(variants)
    }

    async fn embed_if_possible(&self, prompt: &mut Prompt) {
        let Some(embedder) = self.providers.embedder() else { return };
        match embedder.embed(&prompt.content).await {
            Ok(vector) => {
                prompt.embedding_dim = Some(vector.len());
                prompt.embedding_model = Some(embedder.model().to_string());
                prompt.embedding = Some(vector);
            }
            Err(e) => debug!(error = %e, "embedding failed for variant, leaving unembedded"),
        }
    }

    async fn optimize_selected(
        &self,
        prompts: Vec<Prompt>,
        options: &GenerateOptions,
        session_id: uuid::Uuid,
        cancellation: &CancellationToken,
    ) -> Vec<Prompt> {
        let mut optimizer = Optimizer::new(self.providers.clone());
        if let Some(storage) = &self.storage {
            optimizer = optimizer.with_storage(storage.clone());
        }

        let mut out = Vec::with_capacity(prompts.len());
        for mut prompt in prompts {
            let request = OptimizationRequest {
                original_prompt: prompt.content.clone(),
                task: "refine the prompt for production use".to_string(),
                constraints: Vec::new(),
                model_family: options.target_model.clone(),
                persona: options.persona.clone(),
                max_iterations: options.optimize_max_iterations.unwrap_or(3),
                target_score: options.optimize_target_score.unwrap_or(0.85),
                session_id: Some(session_id),
            };
            match optimizer.optimize(&request, cancellation).await {
                Ok(result) if result.final_score > result.original_score => {
                    prompt.content = result.best_content;
                    prompt.score = Some(result.final_score);
                    prompt.updated_at = chrono::Utc::now();
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "optimization failed for selected prompt, keeping original"),
            }
            out.push(prompt);
        }
        out
    }

    fn judge(&self) -> Judge {
        Judge::new(self.providers.clone())
    }
}

fn phase_config(options: &GenerateOptions, phase: Phase) -> PhaseConfig {
    options
        .phase_configs
        .iter()
        .find(|c| c.phase == phase)
        .cloned()
        .unwrap_or(PhaseConfig { phase, provider: None, model: None, temperature: None })
}

fn selection_criteria(options: &GenerateOptions) -> JudgeCriteria {
    JudgeCriteria {
        task: "select the strongest refined prompt".to_string(),
        persona: options.persona.clone(),
        desired_qualities: Vec::new(),
        max_length: None,
    }
}
