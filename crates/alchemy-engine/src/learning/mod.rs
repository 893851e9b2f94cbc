//! Nightly pairwise-comparison learning job: estimates per-feature
//! importance from which prompts users actually chose over their
//! alternatives, and writes the result back as new ranker weights.

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use alchemy_core::{InteractionAction, RankingFeatures, RankingWeights};
use alchemy_storage::Store;
use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::ranker;

/// Below this many (chosen, skipped) pairs, a run is a no-op: not enough
/// signal to move the weights without overfitting to noise.
pub const MIN_TRAINING_PAIRS: usize = 20;

/// What one learning run did, independent of whether it found the data
/// to act on.
#[derive(Debug, Clone)]
pub struct LearningReport {
    pub pairs_used: usize,
    pub weights: RankingWeights,
    pub updated: bool,
}

/// Runs the full procedure against interactions recorded since `since`,
/// returning the (possibly unchanged) weights. Does not touch disk;
/// callers that want the atomic write use [`run_once_and_persist`].
pub async fn run_once(storage: &Store, since: DateTime<Utc>, current: &RankingWeights) -> Result<LearningReport> {
    let interactions = storage.interactions_since(since).await?;

    let mut by_session: HashMap<Uuid, (Vec<Uuid>, Vec<Uuid>)> = HashMap::new();
    for interaction in &interactions {
        let entry = by_session.entry(interaction.session_id).or_default();
        match interaction.action {
            InteractionAction::Chosen => entry.0.push(interaction.prompt_id),
            InteractionAction::Skipped => entry.1.push(interaction.prompt_id),
        }
    }

    let mut diffs: Vec<([f32; 5], f32)> = Vec::new();
    let mut pairs_seen = 0usize;
    for (session_id, (chosen_ids, skipped_ids)) in &by_session {
        if chosen_ids.is_empty() || skipped_ids.is_empty() {
            continue;
        }
        let prompts = storage.get_prompts_by_session(*session_id).await?;
        let by_id: HashMap<Uuid, _> = prompts.into_iter().map(|p| (p.id, p)).collect();

        for &chosen_id in chosen_ids {
            let Some(chosen) = by_id.get(&chosen_id) else { continue };
            for &skipped_id in skipped_ids {
                let Some(skipped) = by_id.get(&skipped_id) else { continue };

                let fc = ranker::compute_features(chosen, &chosen.original_input, None, None);
                let fs = ranker::compute_features(skipped, &skipped.original_input, None, None);

                // Two training rows per pair: the chosen-minus-skipped
                // orientation labeled 1, and its mirror labeled 0.
                diffs.push((feature_diff(&fc, &fs), 1.0));
                diffs.push((feature_diff(&fs, &fc), 0.0));
                pairs_seen += 1;
            }
        }
    }

    let pairs_used = pairs_seen;
    if pairs_used < MIN_TRAINING_PAIRS {
        debug!(pairs_used, need = MIN_TRAINING_PAIRS, "not enough training pairs, skipping weight update");
        return Ok(LearningReport { pairs_used, weights: current.clone(), updated: false });
    }

    let weights = estimate_weights(&diffs);
    info!(pairs_used, "learning run produced updated ranker weights");
    Ok(LearningReport { pairs_used, weights, updated: true })
}

/// Runs [`run_once`] and, if it produced an update, writes the weights to
/// `path` as TOML via a temp-file-then-rename so a reader never observes
/// a partially written file.
pub async fn run_once_and_persist(
    storage: &Store,
    since: DateTime<Utc>,
    current: &RankingWeights,
    path: &Path,
) -> Result<LearningReport> {
    let report = run_once(storage, since, current).await?;
    if report.updated {
        persist_weights(&report.weights, path)?;
    }
    Ok(report)
}

fn persist_weights(weights: &RankingWeights, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(weights)?;
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, &content)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

fn feature_diff(chosen: &RankingFeatures, skipped: &RankingFeatures) -> [f32; 5] {
    [
        chosen.temperature_score - skipped.temperature_score,
        chosen.token_score - skipped.token_score,
        chosen.historical_score - skipped.historical_score,
        chosen.context_score - skipped.context_score,
        chosen.length_score - skipped.length_score,
    ]
}

/// `|sum_j(diff_i) * label_j| / sqrt(sum_j(diff_i^2))` per feature,
/// normalized across the five features to sum to 1. A zero denominator
/// (every diff was zero for that feature) defaults that feature's
/// importance to an equal fifth rather than dividing by zero.
fn estimate_weights(diffs: &[([f32; 5], f32)]) -> RankingWeights {
    let mut numerators = [0.0f32; 5];
    let mut denominators = [0.0f32; 5];

    for (diff, label) in diffs {
        for i in 0..5 {
            numerators[i] += diff[i] * label;
            denominators[i] += diff[i] * diff[i];
        }
    }

    let mut importance = [0.0f32; 5];
    for i in 0..5 {
        importance[i] = if denominators[i] > f32::EPSILON {
            (numerators[i].abs()) / denominators[i].sqrt()
        } else {
            0.2
        };
    }

    let total: f32 = importance.iter().sum();
    if total <= f32::EPSILON {
        return RankingWeights {
            temperature: 0.2,
            token: 0.2,
            historical: 0.2,
            semantic: 0.2,
            length: 0.2,
        };
    }

    RankingWeights {
        temperature: importance[0] / total,
        token: importance[1] / total,
        historical: importance[2] / total,
        semantic: importance[3] / total,
        length: importance[4] / total,
    }
}
