//! AI judge / selector: asks a provider to rank candidate prompts against
//! a set of criteria, with a lenient parse of its response and a ranker
//! fallback when the provider call itself fails.

#[cfg(test)]
mod tests;

use std::sync::Arc;

use alchemy_core::{Prompt, RankingWeights};
use alchemy_providers::{CompletionRequest, Message, ProviderRegistry};
use regex::Regex;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::ranker;

/// What the judge should weigh when scoring candidates.
#[derive(Debug, Clone, Default)]
pub struct JudgeCriteria {
    pub task: String,
    pub persona: Option<String>,
    pub desired_qualities: Vec<String>,
    pub max_length: Option<usize>,
}

/// One candidate's judged score, matched back to its position in the
/// input slice.
#[derive(Debug, Clone)]
pub struct JudgedScore {
    pub index: usize,
    pub score: f32,
    pub reasoning: String,
}

#[derive(Debug, Deserialize)]
struct StrictScoreEntry {
    index: usize,
    score: f32,
    #[serde(default)]
    reasoning: String,
}

pub struct Judge {
    providers: Arc<ProviderRegistry>,
    judge_provider: Option<String>,
    weights: RankingWeights,
}

impl Judge {
    pub fn new(providers: Arc<ProviderRegistry>) -> Self {
        Self { providers, judge_provider: None, weights: RankingWeights::default() }
    }

    pub fn with_judge_provider(mut self, provider: impl Into<String>) -> Self {
        self.judge_provider = Some(provider.into());
        self
    }

    pub fn with_weights(mut self, weights: RankingWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Scores every candidate in `candidates` against `criteria`.
    ///
    /// Falls back to the ranker's aggregate score (and, if that can't run
    /// either, a flat score with the first candidate preferred) so this
    /// method never fails outright — the spec's fallback ladder bottoms
    /// out at "return the first candidate", never an error.
    pub async fn score_candidates(
        &self,
        candidates: &[Prompt],
        criteria: &JudgeCriteria,
        original_input: &str,
        cancellation: &CancellationToken,
    ) -> Vec<JudgedScore> {
        if candidates.is_empty() {
            return Vec::new();
        }

        match self.ask_judge(candidates, criteria, cancellation).await {
            Ok(scores) if scores.len() == candidates.len() => return scores,
            Ok(_) => warn!("judge returned a partial score set, falling back to ranker"),
            Err(e) => warn!(error = %e, "judge provider call failed, falling back to ranker"),
        }

        self.ranker_fallback(candidates, original_input)
    }

    /// Picks the single highest-scoring candidate, tiebreaking on the
    /// lowest original index.
    pub async fn select_best<'a>(
        &self,
        candidates: &'a [Prompt],
        criteria: &JudgeCriteria,
        original_input: &str,
        cancellation: &CancellationToken,
    ) -> Option<&'a Prompt> {
        if candidates.is_empty() {
            return None;
        }
        let scores = self.score_candidates(candidates, criteria, original_input, cancellation).await;
        let best = scores
            .iter()
            .max_by(|a, b| {
                a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal).then_with(|| b.index.cmp(&a.index))
            })
            .map(|s| s.index)
            .unwrap_or(0);
        candidates.get(best)
    }

    async fn ask_judge(
        &self,
        candidates: &[Prompt],
        criteria: &JudgeCriteria,
        cancellation: &CancellationToken,
    ) -> alchemy_providers::Result<Vec<JudgedScore>> {
        let prompt = build_evaluation_prompt(candidates, criteria);
        let request = CompletionRequest::new(
            "judge",
            vec![
                Message::system(
                    "You are an exacting evaluator. Respond ONLY with a JSON array of \
                     objects: [{\"index\":0,\"score\":0.8,\"reasoning\":\"...\"}]. One \
                     entry per candidate, in the order given.",
                ),
                Message::user(prompt),
            ],
        )
        .with_temperature(0.0);

        let response = self
            .providers
            .complete_with_fallback(self.judge_provider.as_deref(), request, cancellation)
            .await?;

        Ok(parse_judge_response(&response.content))
    }

    fn ranker_fallback(&self, candidates: &[Prompt], original_input: &str) -> Vec<JudgedScore> {
        candidates
            .iter()
            .enumerate()
            .map(|(index, prompt)| {
                let features = ranker::compute_features(prompt, original_input, None, None);
                JudgedScore { index, score: self.weights.score(&features), reasoning: "ranker fallback".into() }
            })
            .collect()
    }
}

fn build_evaluation_prompt(candidates: &[Prompt], criteria: &JudgeCriteria) -> String {
    let mut out = String::new();
    out.push_str(&format!("Task: {}\n", criteria.task));
    if let Some(persona) = &criteria.persona {
        out.push_str(&format!("Persona: {persona}\n"));
    }
    if !criteria.desired_qualities.is_empty() {
        out.push_str(&format!("Desired qualities: {}\n", criteria.desired_qualities.join(", ")));
    }
    if let Some(max_length) = criteria.max_length {
        out.push_str(&format!("Maximum acceptable length: {max_length} characters\n"));
    }
    out.push_str("\nCandidates:\n");
    for (i, c) in candidates.iter().enumerate() {
        out.push_str(&format!("[{i}] {}\n", c.content));
    }
    out
}

/// Parses the judge's response, trying a strict JSON array first and
/// falling back to a lenient `index`/`score`/`reasoning` regex scan if
/// the provider didn't return well-formed JSON.
fn parse_judge_response(raw: &str) -> Vec<JudgedScore> {
    if let Some(scores) = parse_strict(raw) {
        return scores;
    }
    parse_lenient(raw)
}

fn parse_strict(raw: &str) -> Option<Vec<JudgedScore>> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    if end < start {
        return None;
    }
    let slice = &raw[start..=end];
    let entries: Vec<StrictScoreEntry> = serde_json::from_str(slice).ok()?;
    Some(
        entries
            .into_iter()
            .map(|e| JudgedScore { index: e.index, score: e.score.clamp(0.0, 1.0), reasoning: e.reasoning })
            .collect(),
    )
}

fn parse_lenient(raw: &str) -> Vec<JudgedScore> {
    let re = Regex::new(r"(?i)index[^0-9]{0,5}(\d+).{0,40}?score[^0-9.]{0,5}(\d*\.?\d+)(?:.*?reasoning[^:]*:?\s*(.+))?")
        .expect("static regex is valid");

    re.captures_iter(raw)
        .filter_map(|caps| {
            let index = caps.get(1)?.as_str().parse().ok()?;
            let score: f32 = caps.get(2)?.as_str().parse().ok()?;
            let reasoning = caps.get(3).map(|m| m.as_str().trim().to_string()).unwrap_or_default();
            Some(JudgedScore { index, score: score.clamp(0.0, 1.0), reasoning })
        })
        .collect()
}
