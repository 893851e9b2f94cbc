//! Concrete provider implementations.

pub mod anthropic;
pub mod embedding;
pub mod gemini;
pub mod grok;
pub mod ollama;
pub mod openai;
pub mod openrouter;

pub use anthropic::{AnthropicConfig, AnthropicProvider};
pub use embedding::OpenAiEmbeddingProvider;
pub use gemini::{GeminiConfig, GeminiProvider};
pub use grok::{GrokConfig, GrokProvider};
pub use ollama::{OllamaConfig, OllamaProvider};
pub use openai::{OpenAiConfig, OpenAiProvider};
pub use openrouter::{OpenRouterConfig, OpenRouterProvider};
