use std::sync::Arc;

use alchemy_providers::mock::MockProvider;
use alchemy_providers::ProviderRegistry;

use tokio_util::sync::CancellationToken;

use super::*;

fn request() -> OptimizationRequest {
    OptimizationRequest {
        original_prompt: "write a function".into(),
        task: "improve clarity".into(),
        constraints: vec![],
        model_family: None,
        persona: None,
        max_iterations: 3,
        target_score: 0.9,
        session_id: None,
    }
}

#[tokio::test]
async fn optimize_accepts_strictly_improving_iterations() {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(MockProvider::new("optimizer", "write a precise, well-documented function")));
    registry.register(Arc::new(MockProvider::new(
        "judge",
        r#"{"factual_accuracy":0.9,"code_quality":0.9,"helpfulness":0.9,"conciseness":0.9}"#,
    )));
    let optimizer = Optimizer::new(Arc::new(registry));

    let result = optimizer.optimize(&request(), &CancellationToken::new()).await.unwrap();
    assert!(result.final_score >= result.original_score);
    assert!(!result.iterations.is_empty());
}

#[tokio::test]
async fn optimize_stops_after_two_non_improving_iterations() {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(MockProvider::new("optimizer", "same quality rewrite")));
    // Judge always returns the same low score, so nothing ever improves.
    registry.register(Arc::new(MockProvider::new(
        "judge",
        r#"{"factual_accuracy":0.1,"code_quality":0.1,"helpfulness":0.1,"conciseness":0.1}"#,
    )));
    let optimizer = Optimizer::new(Arc::new(registry));

    let mut req = request();
    req.max_iterations = 10;
    let result = optimizer.optimize(&req, &CancellationToken::new()).await.unwrap();

    assert!(result.iterations.len() <= 3);
    assert!(result.iterations.iter().all(|i| !i.accepted));
}

#[tokio::test]
async fn optimize_rejects_out_of_range_target_score() {
    let optimizer = Optimizer::new(Arc::new(ProviderRegistry::new()));
    let mut req = request();
    req.target_score = 1.5;
    let err = optimizer.optimize(&req, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, Error::InvalidTargetScore { .. }));
}

#[tokio::test]
async fn optimize_persists_iterations_when_storage_is_set() {
    let store = alchemy_storage::Store::in_memory(4).await.unwrap();
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(MockProvider::new("optimizer", "a better rewrite entirely")));
    registry.register(Arc::new(MockProvider::new(
        "judge",
        r#"{"factual_accuracy":0.9,"code_quality":0.9,"helpfulness":0.9,"conciseness":0.9}"#,
    )));
    let optimizer = Optimizer::new(Arc::new(registry)).with_storage(Arc::new(store.clone()));

    let mut req = request();
    req.session_id = Some(uuid::Uuid::new_v4());
    optimizer.optimize(&req, &CancellationToken::new()).await.unwrap();

    let persisted = store.get_prompts_by_session(req.session_id.unwrap()).await.unwrap();
    assert!(!persisted.is_empty());
}
