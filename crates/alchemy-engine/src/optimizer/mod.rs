//! Iterative meta-prompt optimizer: repeatedly asks a provider to propose
//! a refined variant and a judge provider to score it, accepting only
//! strict improvements, until the target score is hit, iterations run
//! out, or two consecutive iterations fail to improve.

#[cfg(test)]
mod tests;

use std::sync::Arc;

use alchemy_core::{Phase, Prompt, Relationship, RelationshipKind};
use alchemy_providers::{CompletionRequest, Message, ProviderRegistry};
use alchemy_storage::Store;
use regex::Regex;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Weights applied to the four scoring criteria; defaults to an equal
/// quarter each, matching the spec's "weights configurable" note.
#[derive(Debug, Clone, Copy)]
pub struct CriteriaWeights {
    pub factual_accuracy: f32,
    pub code_quality: f32,
    pub helpfulness: f32,
    pub conciseness: f32,
}

impl Default for CriteriaWeights {
    fn default() -> Self {
        Self { factual_accuracy: 0.25, code_quality: 0.25, helpfulness: 0.25, conciseness: 0.25 }
    }
}

/// Inputs describing what to optimize and the bounds of the search.
#[derive(Debug, Clone)]
pub struct OptimizationRequest {
    pub original_prompt: String,
    pub task: String,
    pub constraints: Vec<String>,
    pub model_family: Option<String>,
    pub persona: Option<String>,
    pub max_iterations: u32,
    pub target_score: f32,
    /// Session to attach persisted iterations to; a fresh id if absent.
    pub session_id: Option<Uuid>,
}

/// One accepted-or-rejected attempt within the optimization loop.
#[derive(Debug, Clone)]
pub struct OptimizationIteration {
    pub iteration: u32,
    pub content: String,
    pub score: f32,
    pub accepted: bool,
}

/// The outcome of one full `optimize` call.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub original_score: f32,
    pub final_score: f32,
    pub improvement: f32,
    pub best_content: String,
    pub iterations: Vec<OptimizationIteration>,
}

pub struct Optimizer {
    providers: Arc<ProviderRegistry>,
    storage: Option<Arc<Store>>,
    generator_provider: Option<String>,
    judge_provider: Option<String>,
    weights: CriteriaWeights,
}

impl Optimizer {
    pub fn new(providers: Arc<ProviderRegistry>) -> Self {
        Self { providers, storage: None, generator_provider: None, judge_provider: None, weights: CriteriaWeights::default() }
    }

    pub fn with_storage(mut self, storage: Arc<Store>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_generator_provider(mut self, provider: impl Into<String>) -> Self {
        self.generator_provider = Some(provider.into());
        self
    }

    pub fn with_judge_provider(mut self, provider: impl Into<String>) -> Self {
        self.judge_provider = Some(provider.into());
        self
    }

    pub fn with_weights(mut self, weights: CriteriaWeights) -> Self {
        self.weights = weights;
        self
    }

    pub async fn optimize(
        &self,
        request: &OptimizationRequest,
        cancellation: &CancellationToken,
    ) -> Result<OptimizationResult> {
        if !(0.0..=1.0).contains(&request.target_score) {
            return Err(Error::InvalidTargetScore { target: request.target_score });
        }

        let original_score = self.score(&request.original_prompt, request, cancellation).await?;
        let mut best_content = request.original_prompt.clone();
        let mut best_score = original_score;
        let mut iterations = Vec::new();
        let mut non_improving = 0u32;

        for i in 1..=request.max_iterations {
            if cancellation.is_cancelled() {
                debug!(iteration = i, "optimizer: cancelled, stopping early");
                break;
            }
            let candidate = match self.propose(&best_content, request, cancellation).await {
                Ok(c) => c,
                Err(e) => {
                    warn!(error = %e, iteration = i, "optimizer: generator call failed, stopping early");
                    break;
                }
            };
            let candidate_score = self.score(&candidate, request, cancellation).await?;
            let accepted = candidate_score > best_score;

            iterations.push(OptimizationIteration {
                iteration: i,
                content: candidate.clone(),
                score: candidate_score,
                accepted,
            });

            if accepted {
                best_content = candidate;
                best_score = candidate_score;
                non_improving = 0;
            } else {
                non_improving += 1;
            }

            if best_score >= request.target_score || non_improving >= 2 {
                break;
            }
        }

        if let Some(storage) = &self.storage {
            if let Err(e) = self.persist_iterations(storage, request, &iterations).await {
                debug!(error = %e, "optimizer: failed to persist iteration trail, continuing");
            }
        }

        Ok(OptimizationResult {
            original_score,
            final_score: best_score,
            improvement: best_score - original_score,
            best_content,
            iterations,
        })
    }

    async fn propose(
        &self,
        current_best: &str,
        request: &OptimizationRequest,
        cancellation: &CancellationToken,
    ) -> Result<String> {
        let mut system = "You propose a single improved rewrite of the given prompt for the \
             stated task. Respond with ONLY the rewritten prompt text, nothing else."
            .to_string();
        if let Some(persona) = &request.persona {
            system.push_str(&format!("\n\nPersona: {persona}"));
        }
        if let Some(model_family) = &request.model_family {
            system.push_str(&format!("\n\nTarget model family: {model_family}"));
        }

        let mut user = format!("Task: {}\n\nCurrent best prompt:\n{}\n", request.task, current_best);
        if !request.constraints.is_empty() {
            user.push_str(&format!("\nConstraints:\n- {}\n", request.constraints.join("\n- ")));
        }

        let completion_request =
            CompletionRequest::new("optimizer", vec![Message::system(system), Message::user(user)]);
        let response = self
            .providers
            .complete_with_fallback(self.generator_provider.as_deref(), completion_request, cancellation)
            .await?;
        Ok(response.content.trim().to_string())
    }

    async fn score(
        &self,
        content: &str,
        request: &OptimizationRequest,
        cancellation: &CancellationToken,
    ) -> Result<f32> {
        let system = "You score a candidate prompt against four weighted criteria: \
             factual_accuracy, code_quality, helpfulness, conciseness, each in [0,1]. \
             Respond with ONLY a JSON object like {\"factual_accuracy\":0.8,\
             \"code_quality\":0.7,\"helpfulness\":0.9,\"conciseness\":0.6}.";
        let user = format!("Task: {}\n\nCandidate prompt:\n{}", request.task, content);

        let completion_request =
            CompletionRequest::new("judge", vec![Message::system(system), Message::user(user)]);

        match self.providers.complete_with_fallback(self.judge_provider.as_deref(), completion_request, cancellation).await {
            Ok(response) => Ok(self.parse_weighted_score(&response.content).unwrap_or(0.5)),
            Err(e) => {
                debug!(error = %e, "optimizer: judge call failed, defaulting to neutral score");
                Ok(0.5)
            }
        }
    }

    fn parse_weighted_score(&self, raw: &str) -> Option<f32> {
        let start = raw.find('{')?;
        let end = raw.rfind('}')?;
        if end < start {
            return None;
        }
        let slice = &raw[start..=end];

        #[derive(Deserialize)]
        struct Criteria {
            factual_accuracy: f32,
            code_quality: f32,
            helpfulness: f32,
            conciseness: f32,
        }
        if let Ok(c) = serde_json::from_str::<Criteria>(slice) {
            return Some(
                (self.weights.factual_accuracy * c.factual_accuracy
                    + self.weights.code_quality * c.code_quality
                    + self.weights.helpfulness * c.helpfulness
                    + self.weights.conciseness * c.conciseness)
                    .clamp(0.0, 1.0),
            );
        }

        let re = Regex::new(r"(?i)score[^0-9.]{0,5}(\d*\.?\d+)").expect("static regex is valid");
        re.captures(raw).and_then(|c| c.get(1)).and_then(|m| m.as_str().parse::<f32>().ok()).map(|s| s.clamp(0.0, 1.0))
    }

    async fn persist_iterations(
        &self,
        storage: &Store,
        request: &OptimizationRequest,
        iterations: &[OptimizationIteration],
    ) -> Result<()> {
        let session_id = request.session_id.unwrap_or_else(Uuid::new_v4);
        let mut previous_id: Option<Uuid> = None;

        for iteration in iterations {
            let mut prompt =
                Prompt::new(session_id, Phase::Coagulatio, iteration.content.clone(), request.original_prompt.clone());
            prompt.score = Some(iteration.score);
            prompt.context_snippets.push(format!("iteration {} (accepted={})", iteration.iteration, iteration.accepted));
            storage.insert_prompt(&prompt).await?;

            if let Some(source_id) = previous_id {
                let relationship = Relationship {
                    id: Uuid::new_v4(),
                    source_id,
                    target_id: prompt.id,
                    kind: RelationshipKind::OptimizedFrom,
                    strength: iteration.score,
                    created_at: chrono::Utc::now(),
                };
                storage.insert_relationship(&relationship).await?;
            }
            previous_id = Some(prompt.id);
        }

        Ok(())
    }
}
