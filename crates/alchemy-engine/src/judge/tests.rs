use std::sync::Arc;

use alchemy_core::{Phase, Prompt};
use alchemy_providers::mock::{FailingProvider, MockProvider};
use alchemy_providers::ProviderRegistry;
use uuid::Uuid;

use tokio_util::sync::CancellationToken;

use super::*;

fn prompt(content: &str) -> Prompt {
    Prompt::new(Uuid::new_v4(), Phase::Coagulatio, content.into(), "raw idea".into())
}

fn criteria() -> JudgeCriteria {
    JudgeCriteria { task: "summarize".into(), ..Default::default() }
}

#[test]
fn parse_strict_reads_well_formed_json_array() {
    let raw = r#"Sure, here you go: [{"index":0,"score":0.9,"reasoning":"clear"},{"index":1,"score":0.4,"reasoning":"vague"}]"#;
    let scores = parse_judge_response(raw);
    assert_eq!(scores.len(), 2);
    assert_eq!(scores[0].index, 0);
    assert!((scores[0].score - 0.9).abs() < 1e-6);
    assert_eq!(scores[1].reasoning, "vague");
}

#[test]
fn parse_lenient_recovers_from_non_json_response() {
    let raw = "index: 0, score: 0.75, reasoning: solid structure\nindex: 1, score 0.2 reasoning: too short";
    let scores = parse_judge_response(raw);
    assert_eq!(scores.len(), 2);
    assert!((scores[0].score - 0.75).abs() < 1e-6);
    assert_eq!(scores[1].index, 1);
}

#[tokio::test]
async fn score_candidates_uses_judge_when_available() {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(MockProvider::new(
        "judge",
        r#"[{"index":0,"score":0.3,"reasoning":"meh"},{"index":1,"score":0.95,"reasoning":"great"}]"#,
    )));
    let judge = Judge::new(Arc::new(registry));

    let candidates = vec![prompt("a"), prompt("b")];
    let scores = judge.score_candidates(&candidates, &criteria(), "raw idea", &CancellationToken::new()).await;

    assert_eq!(scores.len(), 2);
    assert!((scores[1].score - 0.95).abs() < 1e-6);
}

#[tokio::test]
async fn score_candidates_falls_back_to_ranker_when_provider_fails() {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(FailingProvider::new("judge")));
    let judge = Judge::new(Arc::new(registry));

    let candidates = vec![prompt("short"), prompt(&"x".repeat(500))];
    let scores = judge.score_candidates(&candidates, &criteria(), "raw idea", &CancellationToken::new()).await;

    assert_eq!(scores.len(), 2);
}

#[tokio::test]
async fn select_best_picks_highest_scoring_candidate() {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(MockProvider::new(
        "judge",
        r#"[{"index":0,"score":0.1,"reasoning":"weak"},{"index":1,"score":0.99,"reasoning":"strong"}]"#,
    )));
    let judge = Judge::new(Arc::new(registry));

    let candidates = vec![prompt("weak one"), prompt("strong one")];
    let best = judge.select_best(&candidates, &criteria(), "raw idea", &CancellationToken::new()).await.unwrap();
    assert_eq!(best.content, "strong one");
}

#[tokio::test]
async fn select_best_returns_none_for_empty_candidates() {
    let judge = Judge::new(Arc::new(ProviderRegistry::new()));
    assert!(judge.select_best(&[], &criteria(), "raw idea", &CancellationToken::new()).await.is_none());
}
