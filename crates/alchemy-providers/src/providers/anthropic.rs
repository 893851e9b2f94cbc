//! Anthropic completion provider. `async-openai` speaks the OpenAI wire
//! format only, so Anthropic talks directly over `reqwest`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::traits::CompletionProvider;
use crate::types::{CompletionRequest, CompletionResponse, MessageRole, TokenUsage};

const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
const SUGGESTED_MODELS: &[&str] =
    &["claude-3-5-sonnet-20241022", "claude-3-5-haiku-20241022", "claude-3-opus-20240229"];
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub base_url: String,
    pub default_model: String,
}

impl AnthropicConfig {
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").ok()?;
        Some(Self {
            api_key,
            base_url: std::env::var("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|_| "https://api.anthropic.com".to_string()),
            default_model: std::env::var("ANTHROPIC_DEFAULT_MODEL")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        })
    }
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct AnthropicContentBlock {
    text: String,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
    model: String,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Deserialize)]
struct AnthropicErrorBody {
    error: AnthropicErrorDetail,
}

#[derive(Deserialize)]
struct AnthropicErrorDetail {
    message: String,
}

pub struct AnthropicProvider {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Option<Result<Self>> {
        AnthropicConfig::from_env().map(Self::new)
    }
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
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

        let system = request
            .messages
            .iter()
            .find(|m| m.role == MessageRole::System)
            .map(|m| m.content.clone());

        let messages = request
            .messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(|m| AnthropicMessage {
                role: if m.role == MessageRole::Assistant { "assistant" } else { "user" },
                content: m.content.clone(),
            })
            .collect();

        let body = AnthropicRequest {
            model,
            max_tokens: request.max_tokens.unwrap_or(4096),
            messages,
            system,
            temperature: request.temperature,
        };

        debug!("sending message request to Anthropic");
        let url = format!("{}/v1/messages", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout("anthropic".into(), 120_000)
                } else {
                    Error::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| Error::Network(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<AnthropicErrorBody>(&text)
                .map(|b| b.error.message)
                .unwrap_or(text);
            return Err(Error::Api("anthropic".into(), message));
        }

        let parsed: AnthropicResponse = serde_json::from_str(&text)
            .map_err(|e| Error::InvalidResponse("anthropic".into(), e.to_string()))?;

        let content = parsed.content.into_iter().map(|b| b.text).collect::<Vec<_>>().join("");

        Ok(CompletionResponse {
            content,
            model: parsed.model,
            usage: Some(TokenUsage {
                prompt_tokens: parsed.usage.input_tokens,
                completion_tokens: parsed.usage.output_tokens,
                total_tokens: parsed.usage.input_tokens + parsed.usage.output_tokens,
            }),
            finish_reason: parsed.stop_reason,
        })
    }
}
