//! Completion and embedding provider abstractions plus a registry with a
//! fixed-priority fallback chain.

pub mod error;
pub mod mock;
pub mod providers;
pub mod registry;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use registry::ProviderRegistry;
pub use traits::{CompletionProvider, EmbeddingProvider};
pub use types::{CompletionRequest, CompletionResponse, Message, MessageRole, TokenUsage};

use std::sync::Arc;

/// Builds a registry from whatever provider credentials are present in
/// the environment. Providers without credentials are simply omitted;
/// callers should check `registry.list()` before assuming any provider
/// in particular is present.
pub fn registry_from_env() -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();

    if let Some(p) = providers::OpenAiProvider::from_env() {
        registry.register(Arc::new(p));
    }
    if let Some(Ok(p)) = providers::AnthropicProvider::from_env() {
        registry.register(Arc::new(p));
    }
    if let Some(Ok(p)) = providers::GeminiProvider::from_env() {
        registry.register(Arc::new(p));
    }
    if let Some(p) = providers::OpenRouterProvider::from_env() {
        registry.register(Arc::new(p));
    }
    if let Some(p) = providers::GrokProvider::from_env() {
        registry.register(Arc::new(p));
    }
    if let Ok(p) = providers::OllamaProvider::from_env() {
        registry.register(Arc::new(p));
    }

    if let Some(embedder) = providers::OpenAiEmbeddingProvider::from_env() {
        registry.set_embedder(Arc::new(embedder));
    }

    registry
}
