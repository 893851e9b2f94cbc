//! Weighted multi-feature scoring over a set of candidate prompts.
//!
//! Pure function of the prompt set plus the caller's original input: no
//! network or storage access happens here, which is what lets the judge
//! (§4.5) and the optimizer (§4.6) fall back to it when a provider call
//! fails.

#[cfg(test)]
mod tests;

use alchemy_core::{Prompt, RankingFeatures, RankingWeights};

/// Cosine similarity between two equal-length vectors, or `None` if either
/// is empty or a zero vector.
fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return None;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

/// `min(|a|,|b|) / max(|a|,|b|)`, the fallback used whenever an embedding
/// comparison isn't available.
fn length_ratio(a: &str, b: &str) -> f32 {
    let (a, b) = (a.len() as f32, b.len() as f32);
    if a == 0.0 && b == 0.0 {
        return 1.0;
    }
    a.min(b) / a.max(b)
}

fn temperature_score(temperature: f32) -> f32 {
    (1.0 - (temperature - 0.7).abs() / 0.7).clamp(0.0, 1.0)
}

/// 1.0 inside `[100, 2000]` chars, decaying linearly outside.
fn token_score(content_len: usize) -> f32 {
    let len = content_len as f32;
    if (100.0..=2000.0).contains(&len) {
        1.0
    } else if len < 100.0 {
        (len / 100.0).clamp(0.0, 1.0)
    } else {
        (1.0 - (len - 2000.0) / 2000.0).clamp(0.0, 1.0)
    }
}

/// Cosine similarity of the prompt's embedding to the original input's
/// embedding, or the length-ratio proxy when either vector is missing.
fn context_score(prompt: &Prompt, original_input: &str, original_embedding: Option<&[f32]>) -> f32 {
    if let (Some(p), Some(q)) = (prompt.embedding.as_deref(), original_embedding) {
        if let Some(sim) = cosine_similarity(p, q) {
            return sim.clamp(0.0, 1.0);
        }
    }
    length_ratio(&prompt.content, original_input)
}

/// Computes the five bounded ranking features for one prompt.
///
/// `historical` is the prompt's mean effectiveness across recorded usage
/// analytics, if any were fetched from storage; absent history defaults
/// to `0.5`. Temperature is read directly off the prompt, since every
/// prompt now records the temperature it was generated at.
pub fn compute_features(
    prompt: &Prompt,
    original_input: &str,
    original_embedding: Option<&[f32]>,
    historical: Option<f32>,
) -> RankingFeatures {
    RankingFeatures {
        temperature_score: temperature_score(prompt.temperature),
        token_score: token_score(prompt.content.len()),
        historical_score: historical.unwrap_or(0.5),
        context_score: context_score(prompt, original_input, original_embedding),
        length_score: length_ratio(&prompt.content, original_input),
    }
}

/// Ranks `prompts` against `original_input`, attaching `score` to each and
/// sorting descending, ties broken by `created_at` descending (the newer
/// of two equally-scored prompts wins).
pub fn rank(
    weights: &RankingWeights,
    mut prompts: Vec<Prompt>,
    original_input: &str,
    original_embedding: Option<&[f32]>,
    historical: impl Fn(uuid::Uuid) -> Option<f32>,
) -> Vec<Prompt> {
    for prompt in &mut prompts {
        let effectiveness = historical(prompt.id);
        let features = compute_features(prompt, original_input, original_embedding, effectiveness);
        prompt.score = Some(weights.score(&features));
    }
    prompts.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    prompts
}
