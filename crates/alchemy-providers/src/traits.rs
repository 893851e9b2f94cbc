//! The two provider abstractions the registry dispatches to.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{CompletionRequest, CompletionResponse};

/// A backend capable of producing a phase's prompt text.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Short, stable provider name used in config and logs (e.g. `"openai"`).
    fn name(&self) -> &str;

    /// Model used when a request does not name one explicitly.
    fn default_model(&self) -> &str;

    /// Models this provider is known to support.
    fn available_models(&self) -> Vec<String>;

    /// Cheap reachability probe; used to skip providers without valid
    /// credentials rather than failing the whole fallback chain on them.
    async fn is_available(&self) -> bool {
        true
    }

    /// Produce a completion for `request`.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}

/// A backend capable of embedding text for the vector index.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Length of the vectors this provider returns.
    fn dimensions(&self) -> usize;

    /// Model name, recorded on the prompt so a dimension change downstream
    /// can be detected.
    fn model(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Batch form; the default calls `embed` sequentially, providers with
    /// a native batch endpoint should override this.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}
