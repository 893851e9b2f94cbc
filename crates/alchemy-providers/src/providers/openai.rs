//! OpenAI completion provider, backed by `async-openai`.

use async_openai::config::OpenAIConfig as AsyncOpenAiConfig;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::traits::CompletionProvider;
use crate::types::{CompletionRequest, CompletionResponse, MessageRole, TokenUsage};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const SUGGESTED_MODELS: &[&str] = &["gpt-4o", "gpt-4o-mini", "gpt-4-turbo", "o1-mini"];

/// Configuration for the OpenAI provider, populated from the environment.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub default_model: String,
}

impl OpenAiConfig {
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok()?;
        Some(Self {
            api_key,
            base_url: std::env::var("OPENAI_BASE_URL").ok(),
            default_model: std::env::var("OPENAI_DEFAULT_MODEL")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        })
    }
}

pub struct OpenAiProvider {
    client: Client<AsyncOpenAiConfig>,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> Self {
        let mut async_config = AsyncOpenAiConfig::new().with_api_key(&config.api_key);
        if let Some(base) = &config.base_url {
            async_config = async_config.with_api_base(base);
        }
        Self { client: Client::with_config(async_config), config }
    }

    pub fn from_env() -> Option<Self> {
        Some(Self::new(OpenAiConfig::from_env()?))
    }

    pub(crate) fn to_chat_messages(
        messages: &[crate::types::Message],
    ) -> Result<Vec<ChatCompletionRequestMessage>> {
        messages
            .iter()
            .map(|m| {
                let built = match m.role {
                    MessageRole::System => ChatCompletionRequestSystemMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::System),
                    MessageRole::User => ChatCompletionRequestUserMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::User),
                    MessageRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::Assistant),
                };
                built.map_err(|e| Error::InvalidResponse("openai".into(), e.to_string()))
            })
            .collect()
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
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
        let model = if request.model.is_empty() { self.default_model() } else { &request.model };
        let chat_messages = Self::to_chat_messages(&request.messages)?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(model).messages(chat_messages);
        if let Some(max_tokens) = request.max_tokens {
            builder.max_tokens(max_tokens);
        }
        if let Some(temperature) = request.temperature {
            builder.temperature(temperature);
        }
        let chat_request = builder
            .build()
            .map_err(|e| Error::InvalidResponse("openai".into(), e.to_string()))?;

        debug!("sending chat completion to OpenAI");
        let response = self.client.chat().create(chat_request).await.map_err(|e| {
            Error::Api("openai".into(), e.to_string())
        })?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidResponse("openai".into(), "empty choices".into()))?;

        let usage = response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            model: response.model,
            usage,
            finish_reason: choice.finish_reason.map(|r| format!("{r:?}")),
        })
    }
}
