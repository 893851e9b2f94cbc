//! Google Gemini completion provider over the `generateContent` REST API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::traits::CompletionProvider;
use crate::types::{CompletionRequest, CompletionResponse, MessageRole, TokenUsage};

const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const SUGGESTED_MODELS: &[&str] = &["gemini-1.5-pro", "gemini-1.5-flash", "gemini-2.0-flash"];

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub default_model: String,
}

impl GeminiConfig {
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("GEMINI_API_KEY").ok()?;
        Some(Self {
            api_key,
            base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".to_string()),
            default_model: std::env::var("GEMINI_DEFAULT_MODEL")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        })
    }
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct GeminiResponseContent {
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiResponseContent,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiUsageMetadata {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount")]
    candidates_token_count: u32,
    #[serde(rename = "totalTokenCount")]
    total_token_count: u32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsageMetadata>,
}

pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Option<Result<Self>> {
        GeminiConfig::from_env().map(Self::new)
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
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

        let system_instruction = request
            .messages
            .iter()
            .find(|m| m.role == MessageRole::System)
            .map(|m| GeminiContent { role: "user", parts: vec![GeminiPart { text: m.content.clone() }] });

        let contents = request
            .messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(|m| GeminiContent {
                role: if m.role == MessageRole::Assistant { "model" } else { "user" },
                parts: vec![GeminiPart { text: m.content.clone() }],
            })
            .collect();

        let body = GeminiRequest {
            contents,
            system_instruction,
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        };

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url, model, self.config.api_key
        );

        debug!("sending generateContent request to Gemini");
        let response = self.client.post(&url).json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout("gemini".into(), 120_000)
            } else {
                Error::Network(e.to_string())
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| Error::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Api("gemini".into(), text));
        }

        let parsed: GeminiResponse = serde_json::from_str(&text)
            .map_err(|e| Error::InvalidResponse("gemini".into(), e.to_string()))?;

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidResponse("gemini".into(), "empty candidates".into()))?;

        let content = candidate
            .content
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");

        let usage = parsed.usage_metadata.map(|u| TokenUsage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        Ok(CompletionResponse {
            content,
            model: model.to_string(),
            usage,
            finish_reason: candidate.finish_reason,
        })
    }
}
