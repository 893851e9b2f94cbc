//! In-memory providers for tests in this crate and its dependents.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::traits::{CompletionProvider, EmbeddingProvider};
use crate::types::{CompletionRequest, CompletionResponse};

/// Always succeeds with a fixed response; counts how many times it was
/// called so fallback-order tests can assert on call counts.
pub struct MockProvider {
    name: String,
    response: String,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(name: impl Into<String>, response: impl Into<String>) -> Self {
        Self { name: name.into(), response: response.into(), calls: AtomicUsize::new(0) }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }

    fn available_models(&self) -> Vec<String> {
        vec!["mock-model".to_string()]
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(CompletionResponse {
            content: self.response.clone(),
            model: "mock-model".to_string(),
            usage: None,
            finish_reason: Some("stop".to_string()),
        })
    }
}

/// Always fails; used to exercise the fallback chain.
pub struct FailingProvider {
    name: String,
}

impl FailingProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl CompletionProvider for FailingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }

    fn available_models(&self) -> Vec<String> {
        vec![]
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
        Err(Error::Api(self.name.clone(), "simulated failure".to_string()))
    }
}

/// Deterministic embedder: hashes the text into a fixed-length vector so
/// similarity comparisons in tests are reproducible without a real model.
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        "mock-embed"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vec = vec![0.0f32; self.dimensions];
        for (i, byte) in text.bytes().enumerate() {
            vec[i % self.dimensions] += byte as f32 / 255.0;
        }
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vec {
                *v /= norm;
            }
        }
        Ok(vec)
    }
}
