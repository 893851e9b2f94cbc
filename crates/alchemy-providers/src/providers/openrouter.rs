//! OpenRouter completion provider. OpenRouter exposes an OpenAI-compatible
//! chat completions endpoint, so this reuses `async-openai` with a custom
//! base URL rather than rolling a bespoke client.

use async_openai::config::OpenAIConfig as AsyncOpenAiConfig;
use async_openai::types::CreateChatCompletionRequestArgs;
use async_openai::Client;
use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::providers::openai::OpenAiProvider;
use crate::traits::CompletionProvider;
use crate::types::{CompletionRequest, CompletionResponse, TokenUsage};

const DEFAULT_MODEL: &str = "meta-llama/llama-3.1-70b-instruct";
const SUGGESTED_MODELS: &[&str] = &[
    "meta-llama/llama-3.1-70b-instruct",
    "anthropic/claude-3.5-sonnet",
    "google/gemini-pro-1.5",
];

#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    pub api_key: String,
    pub base_url: String,
    pub default_model: String,
}

impl OpenRouterConfig {
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("OPENROUTER_API_KEY").ok()?;
        Some(Self {
            api_key,
            base_url: std::env::var("OPENROUTER_BASE_URL")
                .unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string()),
            default_model: std::env::var("OPENROUTER_DEFAULT_MODEL")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        })
    }
}

pub struct OpenRouterProvider {
    client: Client<AsyncOpenAiConfig>,
    config: OpenRouterConfig,
}

impl OpenRouterProvider {
    pub fn new(config: OpenRouterConfig) -> Self {
        let async_config = AsyncOpenAiConfig::new()
            .with_api_key(&config.api_key)
            .with_api_base(&config.base_url);
        Self { client: Client::with_config(async_config), config }
    }

    pub fn from_env() -> Option<Self> {
        Some(Self::new(OpenRouterConfig::from_env()?))
    }
}

#[async_trait]
impl CompletionProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    fn available_models(&self) -> Vec<String> {
        SUGGESTED_MODELS.iter().map(|s| (*s).to_string()).collect()
    }

    async fn is_available(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let model = if request.model.is_empty() {
            self.default_model().to_string()
        } else {
            request.model.clone()
        };
        let chat_messages = OpenAiProvider::to_chat_messages(&request.messages)?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(&model).messages(chat_messages);
        if let Some(max_tokens) = request.max_tokens {
            builder.max_tokens(max_tokens);
        }
        if let Some(temperature) = request.temperature {
            builder.temperature(temperature);
        }
        let chat_request = builder
            .build()
            .map_err(|e| Error::InvalidResponse("openrouter".into(), e.to_string()))?;

        debug!("sending chat completion to OpenRouter");
        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e| Error::Api("openrouter".into(), e.to_string()))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidResponse("openrouter".into(), "empty choices".into()))?;

        let usage = response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            model,
            usage,
            finish_reason: choice.finish_reason.map(|r| format!("{r:?}")),
        })
    }
}
