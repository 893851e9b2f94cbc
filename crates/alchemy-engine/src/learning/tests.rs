use alchemy_core::{Interaction, InteractionAction, Phase, Prompt};
use alchemy_storage::Store;
use chrono::{Duration, Utc};
use uuid::Uuid;

use super::*;

async fn seeded_store(pairs: usize) -> (Store, Uuid) {
    let store = Store::in_memory(4).await.unwrap();
    let session_id = Uuid::new_v4();

    for i in 0..pairs {
        let chosen = Prompt::new(session_id, Phase::Coagulatio, "x".repeat(300 + i), "raw idea".into());
        let skipped = Prompt::new(session_id, Phase::Coagulatio, "y".repeat(10), "raw idea".into());

        store.insert_prompt(&chosen).await.unwrap();
        store.insert_prompt(&skipped).await.unwrap();

        store
            .insert_interaction(&Interaction {
                id: Uuid::new_v4(),
                prompt_id: chosen.id,
                session_id,
                action: InteractionAction::Chosen,
                rating: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        store
            .insert_interaction(&Interaction {
                id: Uuid::new_v4(),
                prompt_id: skipped.id,
                session_id,
                action: InteractionAction::Skipped,
                rating: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    (store, session_id)
}

#[tokio::test]
async fn run_once_is_a_no_op_below_the_minimum_pair_count() {
    let (store, _session_id) = seeded_store(3).await;
    let since = Utc::now() - Duration::hours(1);
    let current = RankingWeights::default();

    let report = run_once(&store, since, &current).await.unwrap();
    assert!(!report.updated);
    assert_eq!(report.pairs_used, 3);
}

#[tokio::test]
async fn run_once_updates_weights_once_enough_pairs_exist() {
    let (store, _session_id) = seeded_store(MIN_TRAINING_PAIRS).await;
    let since = Utc::now() - Duration::hours(1);
    let current = RankingWeights::default();

    let report = run_once(&store, since, &current).await.unwrap();
    assert!(report.updated);
    assert!(report.weights.is_normalized());
}

#[tokio::test]
async fn run_once_ignores_interactions_before_the_watermark() {
    let (store, _session_id) = seeded_store(MIN_TRAINING_PAIRS).await;
    let since = Utc::now() + Duration::hours(1);
    let current = RankingWeights::default();

    let report = run_once(&store, since, &current).await.unwrap();
    assert!(!report.updated);
    assert_eq!(report.pairs_used, 0);
}

#[test]
fn estimate_weights_falls_back_to_equal_shares_on_zero_variance() {
    let diffs = vec![([0.0f32; 5], 1.0), ([0.0f32; 5], 0.0)];
    let weights = estimate_weights(&diffs);
    assert!((weights.temperature - 0.2).abs() < 1e-6);
    assert!(weights.is_normalized());
}

#[test]
fn estimate_weights_favors_the_feature_with_strongest_signal() {
    // historical_score (index 2) always separates chosen from skipped;
    // the others are pure noise around zero.
    let diffs: Vec<_> = (0..10)
        .flat_map(|i| {
            let noise = if i % 2 == 0 { 0.01 } else { -0.01 };
            vec![
                ([noise, noise, 0.8, noise, noise], 1.0),
                ([-noise, -noise, -0.8, -noise, -noise], 0.0),
            ]
        })
        .collect();
    let weights = estimate_weights(&diffs);
    assert!(weights.historical > weights.temperature);
    assert!(weights.historical > weights.token);
    assert!(weights.historical > weights.semantic);
    assert!(weights.historical > weights.length);
}
