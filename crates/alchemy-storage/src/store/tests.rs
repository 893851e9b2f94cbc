use alchemy_core::{
    Interaction, InteractionAction, Phase, Prompt, Relationship, RelationshipKind, UsageAnalytics,
};
use chrono::Utc;
use uuid::Uuid;

use super::query::SearchFilter;
use super::Store;

async fn store() -> Store {
    Store::in_memory(4).await.unwrap()
}

fn prompt_with_embedding(session_id: Uuid, phase: Phase, embedding: Vec<f32>) -> Prompt {
    let mut prompt = Prompt::new(session_id, phase, "refined text".into(), "raw idea".into());
    prompt.embedding_dim = Some(embedding.len());
    prompt.embedding_model = Some("mock".into());
    prompt.embedding = Some(embedding);
    prompt
}

#[tokio::test]
async fn insert_and_get_prompt_round_trips() {
    let store = store().await;
    let session_id = Uuid::new_v4();
    let prompt = prompt_with_embedding(session_id, Phase::Solutio, vec![1.0, 0.0, 0.0, 0.0]);

    store.insert_prompt(&prompt).await.unwrap();
    let fetched = store.get_prompt(prompt.id).await.unwrap().unwrap();

    assert_eq!(fetched.id, prompt.id);
    assert_eq!(fetched.content, prompt.content);
    assert_eq!(fetched.phase, Phase::Solutio);
    assert_eq!(fetched.embedding, Some(vec![1.0, 0.0, 0.0, 0.0]));
}

#[tokio::test]
async fn insert_prompt_rejects_mismatched_embedding_dimension_and_leaves_store_unchanged() {
    let store = store().await;
    let session_id = Uuid::new_v4();
    let prompt = prompt_with_embedding(session_id, Phase::Solutio, vec![1.0, 0.0, 0.0]);

    let err = store.insert_prompt(&prompt).await.unwrap_err();
    assert!(matches!(err, crate::error::Error::DimensionMismatch { expected: 4, actual: 3 }));
    assert!(store.get_prompt(prompt.id).await.unwrap().is_none());
    assert_eq!(store.prompt_count().await.unwrap(), 0);
}

#[tokio::test]
async fn semantic_search_finds_nearest_embedding() {
    let store = store().await;
    let session_id = Uuid::new_v4();

    let near = prompt_with_embedding(session_id, Phase::Coagulatio, vec![1.0, 0.0, 0.0, 0.0]);
    let far = prompt_with_embedding(session_id, Phase::Coagulatio, vec![0.0, 1.0, 0.0, 0.0]);
    store.insert_prompt(&near).await.unwrap();
    store.insert_prompt(&far).await.unwrap();

    let results = store
        .semantic_search(&[1.0, 0.0, 0.0, 0.0], 1, &SearchFilter::default())
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].prompt.id, near.id);
}

#[tokio::test]
async fn semantic_search_respects_phase_filter() {
    let store = store().await;
    let session_id = Uuid::new_v4();

    let prima = prompt_with_embedding(session_id, Phase::PrimaMateria, vec![1.0, 0.0, 0.0, 0.0]);
    let coag = prompt_with_embedding(session_id, Phase::Coagulatio, vec![1.0, 0.0, 0.0, 0.0]);
    store.insert_prompt(&prima).await.unwrap();
    store.insert_prompt(&coag).await.unwrap();

    let filter = SearchFilter { phase: Some(Phase::Coagulatio), ..Default::default() };
    let results = store.semantic_search(&[1.0, 0.0, 0.0, 0.0], 5, &filter).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].prompt.id, coag.id);
}

#[tokio::test]
async fn record_usage_feeds_average_effectiveness() {
    let store = store().await;
    let session_id = Uuid::new_v4();
    let prompt = Prompt::new(session_id, Phase::Solutio, "content".into(), "idea".into());
    store.insert_prompt(&prompt).await.unwrap();

    assert_eq!(store.average_effectiveness(prompt.id).await.unwrap(), None);

    let first = UsageAnalytics {
        id: Uuid::new_v4(),
        prompt_id: prompt.id,
        session_id,
        effectiveness: 0.8,
        user_feedback: Some(4),
        context: None,
        used_in_generation: true,
        generated_at: Utc::now(),
    };
    store.record_usage(&first).await.unwrap();

    let second = UsageAnalytics {
        id: Uuid::new_v4(),
        prompt_id: prompt.id,
        session_id,
        effectiveness: 0.4,
        user_feedback: None,
        context: None,
        used_in_generation: false,
        generated_at: Utc::now(),
    };
    store.record_usage(&second).await.unwrap();

    let average = store.average_effectiveness(prompt.id).await.unwrap().unwrap();
    assert!((average - 0.6).abs() < 1e-6);
}

#[tokio::test]
async fn insert_interaction_round_trips_without_touching_usage_analytics() {
    let store = store().await;
    let session_id = Uuid::new_v4();
    let prompt = Prompt::new(session_id, Phase::Solutio, "content".into(), "idea".into());
    store.insert_prompt(&prompt).await.unwrap();

    let chosen = Interaction {
        id: Uuid::new_v4(),
        prompt_id: prompt.id,
        session_id,
        action: InteractionAction::Chosen,
        rating: Some(4),
        created_at: Utc::now(),
    };
    store.insert_interaction(&chosen).await.unwrap();

    let recorded = store.interactions_since(chosen.created_at - chrono::Duration::seconds(1)).await.unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].action, InteractionAction::Chosen);
    assert_eq!(store.average_effectiveness(prompt.id).await.unwrap(), None);
}

#[tokio::test]
async fn relationships_are_queryable_from_both_ends() {
    let store = store().await;
    let session_id = Uuid::new_v4();
    let source = Prompt::new(session_id, Phase::Solutio, "a".into(), "idea".into());
    let target = Prompt::new(session_id, Phase::Coagulatio, "b".into(), "idea".into());
    store.insert_prompt(&source).await.unwrap();
    store.insert_prompt(&target).await.unwrap();

    let relationship = Relationship {
        id: Uuid::new_v4(),
        source_id: source.id,
        target_id: target.id,
        kind: RelationshipKind::DerivedFrom,
        strength: 0.9,
        created_at: Utc::now(),
    };
    store.insert_relationship(&relationship).await.unwrap();

    let from_source = store.get_relationships_from(source.id).await.unwrap();
    let to_target = store.get_relationships_to(target.id).await.unwrap();
    assert_eq!(from_source.len(), 1);
    assert_eq!(to_target.len(), 1);
    assert_eq!(from_source[0].id, relationship.id);
}

#[tokio::test]
async fn embedding_stats_reflect_inserted_prompts() {
    let store = store().await;
    let session_id = Uuid::new_v4();
    let embedded = prompt_with_embedding(session_id, Phase::Solutio, vec![1.0, 0.0, 0.0, 0.0]);
    let bare = Prompt::new(session_id, Phase::Solutio, "no embedding".into(), "idea".into());
    store.insert_prompt(&embedded).await.unwrap();
    store.insert_prompt(&bare).await.unwrap();

    let stats = store.embedding_stats().await.unwrap();
    assert_eq!(stats.total_prompts, 2);
    assert_eq!(stats.embedded_prompts, 1);
    assert_eq!(stats.indexed_vectors, 1);
}
