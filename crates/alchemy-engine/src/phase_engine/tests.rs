use std::sync::Arc;

use alchemy_core::{CrossPhaseMode, GenerateOptions, GenerateRequest, Phase};
use alchemy_providers::mock::{FailingProvider, MockEmbeddingProvider, MockProvider};
use alchemy_providers::ProviderRegistry;
use alchemy_storage::Store;
use tokio_util::sync::CancellationToken;

use super::*;

fn options(input: &str) -> GenerateOptions {
    GenerateOptions {
        request: GenerateRequest { input: input.to_string(), count: 1, ..Default::default() },
        include_context: false,
        ..Default::default()
    }
}

fn registry_with(response: &str) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(MockProvider::new("auto", response)));
    registry.register(Arc::new(MockProvider::new("judge", r#"[{"index":0,"score":0.9,"reasoning":"ok"}]"#)));
    registry
}

#[tokio::test]
async fn cascade_mode_chains_winner_and_records_snippets() {
    let registry = registry_with("refined prompt text");
    let engine = PhaseEngine::new(Arc::new(registry));

    let mut opts = options("a raw idea");
    opts.cross_phase = CrossPhaseMode::Cascade;
    opts.request.phases = vec![Phase::PrimaMateria, Phase::Solutio];

    let result = engine.generate(&opts, &CancellationToken::new()).await.unwrap();
    assert_eq!(result.prompts.len(), 2);
    // The second phase's winner should carry a recorded chain of inputs.
    assert!(!result.prompts[1].context_snippets.is_empty());
}

#[tokio::test]
async fn best_mode_selects_one_winner_per_phase_without_snippets() {
    let registry = registry_with("a candidate");
    let engine = PhaseEngine::new(Arc::new(registry));

    let mut opts = options("a raw idea");
    opts.cross_phase = CrossPhaseMode::Best;
    opts.request.phases = vec![Phase::PrimaMateria, Phase::Solutio, Phase::Coagulatio];
    opts.request.count = 3;

    let result = engine.generate(&opts, &CancellationToken::new()).await.unwrap();
    assert_eq!(result.prompts.len(), 3);
    assert!(result.prompts.iter().all(|p| p.context_snippets.is_empty()));
}

#[tokio::test]
async fn all_mode_with_parallel_returns_every_variant() {
    let registry = registry_with("variant");
    let engine = PhaseEngine::new(Arc::new(registry));

    let mut opts = options("a raw idea");
    opts.cross_phase = CrossPhaseMode::All;
    opts.use_parallel = true;
    opts.request.phases = vec![Phase::PrimaMateria, Phase::Solutio];
    opts.request.count = 2;

    let result = engine.generate(&opts, &CancellationToken::new()).await.unwrap();
    assert_eq!(result.prompts.len(), 4);
}

#[tokio::test]
async fn partial_phase_failure_is_recorded_but_does_not_abort() {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(FailingProvider::new("auto")));
    registry.register(Arc::new(MockProvider::new("judge", r#"[{"index":0,"score":0.5,"reasoning":"ok"}]"#)));
    let engine = PhaseEngine::new(Arc::new(registry));

    let mut opts = options("a raw idea");
    opts.cross_phase = CrossPhaseMode::All;
    opts.use_parallel = true;
    opts.request.phases = vec![Phase::PrimaMateria];

    let err = engine.generate(&opts, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, Error::GenerationFailed));
}

#[tokio::test]
async fn empty_phase_list_with_all_providers_failing_errors() {
    let registry = ProviderRegistry::new();
    let engine = PhaseEngine::new(Arc::new(registry));

    let mut opts = options("a raw idea");
    opts.request.phases = vec![Phase::PrimaMateria];

    let err = engine.generate(&opts, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, Error::GenerationFailed));
}

#[tokio::test]
async fn optimize_flag_runs_optimizer_over_selected_prompts() {
    let mut registry = registry_with("base candidate");
    registry.register(Arc::new(MockProvider::new("optimizer", "an improved rewrite")));
    let engine = PhaseEngine::new(Arc::new(registry));

    let mut opts = options("a raw idea");
    opts.request.phases = vec![Phase::Coagulatio];
    opts.optimize = true;
    opts.optimize_max_iterations = Some(1);
    opts.optimize_target_score = Some(0.99);

    let result = engine.generate(&opts, &CancellationToken::new()).await.unwrap();
    assert_eq!(result.prompts.len(), 1);
}

#[tokio::test]
async fn embeddings_and_persistence_round_trip_through_storage() {
    let store = Arc::new(Store::in_memory(4).await.unwrap());
    let mut registry = registry_with("stored candidate");
    registry.set_embedder(Arc::new(MockEmbeddingProvider::new(4)));
    let engine = PhaseEngine::new(Arc::new(registry)).with_storage(store.clone());

    let mut opts = options("a raw idea");
    opts.request.phases = vec![Phase::Coagulatio];

    let result = engine.generate(&opts, &CancellationToken::new()).await.unwrap();
    assert_eq!(result.prompts.len(), 1);
    assert!(result.prompts[0].embedding.is_some());

    let persisted = store.get_prompts_by_session(result.session_id).await.unwrap();
    assert_eq!(persisted.len(), 1);
}
