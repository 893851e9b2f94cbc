//! Ollama local completion provider.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::traits::CompletionProvider;
use crate::types::{CompletionRequest, CompletionResponse, MessageRole, TokenUsage};

const DEFAULT_MODEL: &str = "llama3.1";
const SUGGESTED_MODELS: &[&str] = &["llama3.1", "mistral", "qwen2.5"];

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub default_model: String,
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl OllamaConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("OLLAMA_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            default_model: std::env::var("OLLAMA_DEFAULT_MODEL")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Serialize)]
struct OllamaMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    options: Option<OllamaOptions>,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
    model: String,
    done_reason: Option<String>,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaErrorBody {
    error: String,
}

#[derive(Deserialize)]
struct OllamaTagEntry {
    name: String,
}

#[derive(Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaTagEntry>,
}

/// Local-only provider talking to a running `ollama serve` instance.
pub struct OllamaProvider {
    client: Client,
    config: OllamaConfig,
    cached_models: RwLock<Vec<String>>,
}

impl OllamaProvider {
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;
        Ok(Self { client, config, cached_models: RwLock::new(Vec::new()) })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(OllamaConfig::from_env())
    }

    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Network(format!("failed to connect to Ollama: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Api("ollama".into(), format!("status {}", response.status())));
        }

        let tags: OllamaTagsResponse = response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse("ollama".into(), e.to_string()))?;

        let models: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();
        if let Ok(mut cache) = self.cached_models.write() {
            *cache = models.clone();
        }
        Ok(models)
    }

    async fn send_request(&self, request: OllamaChatRequest) -> Result<OllamaChatResponse> {
        let url = format!("{}/api/chat", self.config.base_url);
        debug!(model = %request.model, "sending request to Ollama");

        let response = self.client.post(&url).json(&request).send().await.map_err(|e| {
            if e.is_connect() {
                Error::Network(format!(
                    "failed to connect to Ollama at {}; is it running?",
                    self.config.base_url
                ))
            } else if e.is_timeout() {
                Error::Timeout("ollama".into(), self.config.timeout.as_millis() as u64)
            } else {
                Error::Network(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| Error::Network(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<OllamaErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            return Err(Error::Api("ollama".into(), message));
        }

        serde_json::from_str(&body).map_err(|e| Error::InvalidResponse("ollama".into(), e.to_string()))
    }
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    fn available_models(&self) -> Vec<String> {
        if let Ok(cache) = self.cached_models.read() {
            if !cache.is_empty() {
                return cache.clone();
            }
        }
        SUGGESTED_MODELS.iter().map(|s| (*s).to_string()).collect()
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url);
        self.client.get(&url).send().await.is_ok()
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let model = if request.model.is_empty() { &self.config.default_model } else { &request.model };

        let messages = request
            .messages
            .iter()
            .map(|m| OllamaMessage {
                role: match m.role {
                    MessageRole::System => "system",
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                },
                content: m.content.clone(),
            })
            .collect();

        let ollama_request = OllamaChatRequest {
            model: model.to_string(),
            messages,
            options: Some(OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            }),
            stream: false,
        };

        let response = self.send_request(ollama_request).await?;

        let usage = match (response.prompt_eval_count, response.eval_count) {
            (Some(prompt), Some(completion)) => {
                Some(TokenUsage { prompt_tokens: prompt, completion_tokens: completion, total_tokens: prompt + completion })
            }
            _ => None,
        };

        Ok(CompletionResponse {
            content: response.message.content,
            model: response.model,
            usage,
            finish_reason: response.done_reason,
        })
    }
}
