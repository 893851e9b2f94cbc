use alchemy_core::{Phase, Prompt, RankingWeights};
use uuid::Uuid;

use super::*;

fn prompt(content: &str) -> Prompt {
    Prompt::new(Uuid::new_v4(), Phase::Solutio, content.into(), "raw idea".into())
}

#[test]
fn temperature_score_peaks_at_0_7() {
    assert_eq!(temperature_score(0.7), 1.0);
    assert!(temperature_score(0.0) < temperature_score(0.5));
    assert!((temperature_score(1.4) - 0.0).abs() < 1e-6);
}

#[test]
fn token_score_is_flat_in_sweet_spot() {
    assert_eq!(token_score(100), 1.0);
    assert_eq!(token_score(2000), 1.0);
    assert!(token_score(10) < 1.0);
    assert!(token_score(4000) < 1.0);
}

#[test]
fn context_score_prefers_embedding_over_length_ratio() {
    let mut p = prompt("short");
    p.embedding = Some(vec![1.0, 0.0]);
    let identical = context_score(&p, "anything", Some(&[1.0, 0.0]));
    assert!((identical - 1.0).abs() < 1e-6);
}

#[test]
fn context_score_falls_back_to_length_ratio_without_embeddings() {
    let p = prompt("abcdefghij");
    let score = context_score(&p, "abcde", None);
    assert!((score - 0.5).abs() < 1e-6);
}

#[test]
fn compute_features_defaults_historical_score_to_half_when_absent() {
    let p = prompt("some reasonably sized prompt body that sits in the sweet spot");
    let features = compute_features(&p, "raw idea", None, None);
    assert_eq!(features.historical_score, 0.5);
}

#[test]
fn compute_features_uses_effectiveness_when_history_present() {
    let p = prompt("content");
    let features = compute_features(&p, "raw idea", None, Some(0.75));
    assert!((features.historical_score - 0.75).abs() < 1e-6);
}

#[test]
fn length_score_is_standalone_length_ratio() {
    let p = prompt("abcdefghij");
    let features = compute_features(&p, "abcde", None, None);
    assert!((features.length_score - 0.5).abs() < 1e-6);
}

#[test]
fn rank_orders_descending_by_score() {
    let weights = RankingWeights::default();
    let strong = prompt(&"x".repeat(500));
    let weak = prompt("y");
    let ranked = rank(&weights, vec![weak.clone(), strong.clone()], "raw idea", None, |_| None);

    assert_eq!(ranked.len(), 2);
    assert!(ranked[0].score.unwrap() >= ranked[1].score.unwrap());
}

#[test]
fn rank_breaks_ties_by_created_at_descending() {
    let weights = RankingWeights::default();
    let mut older = prompt("same length content");
    let newer = prompt("same length content");
    older.created_at = newer.created_at - chrono::Duration::seconds(60);
    older.updated_at = older.created_at;

    let ranked = rank(&weights, vec![older.clone(), newer.clone()], "same length content", None, |_| None);
    assert_eq!(ranked[0].id, newer.id);
}
