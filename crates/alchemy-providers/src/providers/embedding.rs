//! OpenAI-backed embedding provider for the vector index.

use async_openai::config::OpenAIConfig as AsyncOpenAiConfig;
use async_openai::types::CreateEmbeddingRequestArgs;
use async_openai::Client;
use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::providers::openai::OpenAiConfig;
use crate::traits::EmbeddingProvider;

const DEFAULT_MODEL: &str = "text-embedding-3-small";
const DEFAULT_DIMENSIONS: usize = 1536;

/// Embeds text with OpenAI's `text-embedding-3-small` model by default.
pub struct OpenAiEmbeddingProvider {
    client: Client<AsyncOpenAiConfig>,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbeddingProvider {
    pub fn new(config: OpenAiConfig) -> Self {
        let mut async_config = AsyncOpenAiConfig::new().with_api_key(&config.api_key);
        if let Some(base) = &config.base_url {
            async_config = async_config.with_api_base(base);
        }
        let model = std::env::var("OPENAI_EMBEDDING_MODEL")
            .unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let dimensions = std::env::var("OPENAI_EMBEDDING_DIMENSIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_DIMENSIONS);
        Self { client: Client::with_config(async_config), model, dimensions }
    }

    pub fn from_env() -> Option<Self> {
        Some(Self::new(OpenAiConfig::from_env()?))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, text), fields(text_len = text.len()))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(text)
            .build()
            .map_err(|e| Error::InvalidResponse("openai".into(), e.to_string()))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| Error::Api("openai".into(), e.to_string()))?;

        let embedding = response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidResponse("openai".into(), "empty embedding data".into()))?;

        debug!(dims = embedding.embedding.len(), "generated embedding");
        Ok(embedding.embedding)
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(texts.to_vec())
            .build()
            .map_err(|e| Error::InvalidResponse("openai".into(), e.to_string()))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| Error::Api("openai".into(), e.to_string()))?;

        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}
