//! Integration tests for the HTTP API server (C9), exercised against an
//! in-memory store and a registry holding only a mock provider — no
//! network calls.

use std::sync::Arc;
use std::time::Instant;

use alchemy_core::RankingWeights;
use alchemy_engine::PhaseEngine;
use alchemy_providers::mock::{MockEmbeddingProvider, MockProvider};
use alchemy_providers::ProviderRegistry;
use alchemy_storage::Store;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use prompt_alchemy::config::Config;
use prompt_alchemy::http::{router, AppState};
use prompt_alchemy::metrics::Metrics;
use tokio::sync::Semaphore;
use tower::ServiceExt;

async fn test_router() -> axum::Router {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(MockProvider::new("mock", "a generated prompt")));
    registry.set_embedder(Arc::new(MockEmbeddingProvider::new(8)));
    let providers = Arc::new(registry);

    let storage = Arc::new(Store::in_memory(8).await.expect("in-memory store"));
    let engine =
        Arc::new(PhaseEngine::new(providers.clone()).with_storage(storage.clone()).with_weights(RankingWeights::default()));

    let state = AppState {
        engine,
        storage,
        providers,
        metrics: Arc::new(Metrics::default()),
        config: Arc::new(Config::default()),
        generation_limiter: Arc::new(Semaphore::new(4)),
        started_at: Instant::now(),
    };

    router(state)
}

#[tokio::test]
async fn health_reports_healthy_with_a_registered_provider() {
    let app = test_router().await;
    let response = app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn get_prompt_404s_for_unknown_id() {
    let app = test_router().await;
    let uri = format!("/api/v1/prompts/{}", uuid::Uuid::new_v4());
    let response = app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn providers_lists_the_registered_mock() {
    let app = test_router().await;
    let response = app.oneshot(Request::builder().uri("/api/v1/providers").body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn metrics_endpoint_returns_prometheus_text() {
    let app = test_router().await;
    let response = app.oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn generate_rejects_an_unknown_phase_name() {
    let app = test_router().await;
    let body = serde_json::json!({ "input": "design a rate limiter", "phases": ["not-a-real-phase"] });
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/prompts/generate")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
