//! Registry of completion and embedding providers with a fixed-priority
//! fallback chain.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::traits::{CompletionProvider, EmbeddingProvider};
use crate::types::{CompletionRequest, CompletionResponse};

/// Holds every registered completion provider plus the priority order to
/// try them in when a phase does not pin one explicitly.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn CompletionProvider>>,
    /// Fallback order, most preferred first. Providers not registered are
    /// skipped rather than treated as an error.
    priority: Vec<String>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self { providers: HashMap::new(), priority: Vec::new(), embedder: None }
    }

    /// Registers a provider, appending it to the fallback order.
    pub fn register(&mut self, provider: Arc<dyn CompletionProvider>) {
        let name = provider.name().to_string();
        debug!(provider = %name, "registering completion provider");
        self.priority.push(name.clone());
        self.providers.insert(name, provider);
    }

    /// Overrides the fallback order. Names absent from the registry are
    /// ignored at dispatch time rather than rejected here, so config can
    /// list optional providers without failing validation.
    pub fn set_priority(&mut self, priority: Vec<String>) {
        self.priority = priority;
    }

    pub fn set_embedder(&mut self, embedder: Arc<dyn EmbeddingProvider>) {
        self.embedder = Some(embedder);
    }

    pub fn embedder(&self) -> Option<Arc<dyn EmbeddingProvider>> {
        self.embedder.clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CompletionProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        self.priority.iter().map(|s| s.as_str()).collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Completes `request` with `provider_name`, bypassing fallback.
    pub async fn complete_with(
        &self,
        provider_name: &str,
        request: CompletionRequest,
    ) -> Result<CompletionResponse> {
        let provider = self
            .get(provider_name)
            .ok_or_else(|| Error::NotConfigured(provider_name.to_string()))?;
        provider.complete(request).await
    }

    /// Tries `preferred` first if given, then walks the fallback chain in
    /// priority order, skipping providers that are unavailable or error.
    /// Returns the first success; if every provider fails, returns the
    /// last error observed.
    ///
    /// Races every provider call against `cancellation`: if it fires
    /// while a call is in flight, that call is abandoned immediately and
    /// the chain stops with `Error::Cancelled` rather than trying the
    /// next provider.
    pub async fn complete_with_fallback(
        &self,
        preferred: Option<&str>,
        request: CompletionRequest,
        cancellation: &CancellationToken,
    ) -> Result<CompletionResponse> {
        if cancellation.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut order: Vec<&str> = Vec::new();
        if let Some(p) = preferred {
            order.push(p);
        }
        for name in &self.priority {
            if Some(name.as_str()) != preferred {
                order.push(name);
            }
        }

        let mut last_err: Option<Error> = None;
        for name in order {
            let Some(provider) = self.get(name) else { continue };
            if !provider.is_available().await {
                debug!(provider = name, "skipping unavailable provider");
                continue;
            }

            let outcome = tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    info!(provider = name, "generation cancelled while provider call was in flight");
                    return Err(Error::Cancelled);
                }
                result = provider.complete(request.clone()) => result,
            };

            match outcome {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    warn!(provider = name, error = %e, "provider failed, trying next");
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) => Err(e),
            None => {
                info!("no providers registered or all unavailable");
                Err(Error::NoProviderAvailable)
            }
        }
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{FailingProvider, MockProvider};
    use crate::types::Message;

    fn request() -> CompletionRequest {
        CompletionRequest::new("mock-model", vec![Message::user("hello")])
    }

    #[tokio::test]
    async fn complete_with_fallback_uses_first_healthy_provider() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(FailingProvider::new("a")));
        registry.register(Arc::new(MockProvider::new("b", "ok")));

        let token = CancellationToken::new();
        let response = registry.complete_with_fallback(None, request(), &token).await.unwrap();
        assert_eq!(response.content, "ok");
    }

    #[tokio::test]
    async fn complete_with_fallback_prefers_named_provider_first() {
        let mut registry = ProviderRegistry::new();
        let b = Arc::new(MockProvider::new("b", "from-b"));
        registry.register(Arc::new(MockProvider::new("a", "from-a")));
        registry.register(b.clone());

        let token = CancellationToken::new();
        let response = registry.complete_with_fallback(Some("b"), request(), &token).await.unwrap();
        assert_eq!(response.content, "from-b");
        assert_eq!(b.call_count(), 1);
    }

    #[tokio::test]
    async fn complete_with_fallback_errors_when_everyone_fails() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(FailingProvider::new("a")));
        registry.register(Arc::new(FailingProvider::new("b")));

        let token = CancellationToken::new();
        let result = registry.complete_with_fallback(None, request(), &token).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn complete_with_fallback_errors_when_registry_is_empty() {
        let registry = ProviderRegistry::new();
        let token = CancellationToken::new();
        let result = registry.complete_with_fallback(None, request(), &token).await;
        assert!(matches!(result, Err(Error::NoProviderAvailable)));
    }

    #[tokio::test]
    async fn complete_with_fallback_returns_cancelled_when_token_already_fired() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(MockProvider::new("a", "from-a")));

        let token = CancellationToken::new();
        token.cancel();
        let result = registry.complete_with_fallback(None, request(), &token).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn complete_with_named_provider_bypasses_fallback() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(MockProvider::new("a", "from-a")));

        let err = registry.complete_with("missing", request()).await.unwrap_err();
        assert!(matches!(err, Error::NotConfigured(name) if name == "missing"));
    }
}
