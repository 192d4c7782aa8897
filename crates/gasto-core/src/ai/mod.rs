//! Pluggable LLM backend abstraction
//!
//! - `AIBackend` trait: the one operation the classifier needs, plus health info
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OpenAICompatibleBackend`, `OllamaBackend`, `MockBackend`
//!
//! # Configuration
//!
//! Environment variables, read once at startup by [`AIClient::from_settings`]:
//! - `AI_BACKEND`: `openai` (default), `ollama` or `mock`
//! - `OPENAI_API_KEY`: required for the openai backend
//! - `OPENAI_BASE_URL`: default `https://api.openai.com`
//! - `OPENAI_MODEL`: default `gpt-4o-mini`
//! - `OLLAMA_HOST`: required for the ollama backend
//! - `OLLAMA_MODEL`: default `llama3.2`
//!
//! Request parameters (temperature, output bound, timeout) come from
//! [`AiSettings`](crate::settings::AiSettings).

mod mock;
mod ollama;
mod openai_compatible;
pub mod prompt;

pub use mock::{MockBackend, MockReply};
pub use ollama::OllamaBackend;
pub use openai_compatible::OpenAICompatibleBackend;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::Result;
use crate::settings::AiSettings;

/// Trait defining the interface for all LLM backends
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Ask the model for the category of a transaction
    ///
    /// Returns the raw text reply; callers trim and validate it.
    async fn categorize_transaction(
        &self,
        description: &str,
        amount: Option<Decimal>,
    ) -> Result<String>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Get the model name (for logging)
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete AI client enum
#[derive(Clone)]
pub enum AIClient {
    /// OpenAI chat completions API (or any compatible server)
    OpenAICompatible(OpenAICompatibleBackend),
    /// Ollama HTTP API
    Ollama(OllamaBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AIClient {
    /// Create an AI client from the process environment
    ///
    /// Returns None when the selected backend has no credentials or host
    /// configured; the classifier then goes straight to the keyword fallback.
    pub fn from_settings(settings: &AiSettings) -> Option<Self> {
        Self::from_lookup(settings, |key| std::env::var(key).ok())
    }

    /// Same as [`from_settings`](Self::from_settings) with an explicit variable lookup
    pub fn from_lookup(
        settings: &AiSettings,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Option<Self> {
        let backend = lookup("AI_BACKEND").unwrap_or_else(|| "openai".to_string());

        let client = match backend.trim().to_lowercase().as_str() {
            "openai" | "openai_compatible" => {
                let api_key = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty())?;
                let base_url = lookup("OPENAI_BASE_URL")
                    .unwrap_or_else(|| openai_compatible::DEFAULT_BASE_URL.to_string());
                let model = lookup("OPENAI_MODEL")
                    .unwrap_or_else(|| openai_compatible::DEFAULT_MODEL.to_string());
                OpenAICompatibleBackend::new(&base_url, &model, Some(&api_key), settings)
                    .map(AIClient::OpenAICompatible)
            }
            "ollama" => {
                let host = lookup("OLLAMA_HOST").filter(|h| !h.trim().is_empty())?;
                let model =
                    lookup("OLLAMA_MODEL").unwrap_or_else(|| ollama::DEFAULT_MODEL.to_string());
                OllamaBackend::new(&host, &model, settings).map(AIClient::Ollama)
            }
            "mock" => Ok(AIClient::Mock(MockBackend::new())),
            _ => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, LLM categorization disabled");
                return None;
            }
        };

        match client {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!("Failed to build AI client: {}", e);
                None
            }
        }
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }
}

#[async_trait]
impl AIBackend for AIClient {
    async fn categorize_transaction(
        &self,
        description: &str,
        amount: Option<Decimal>,
    ) -> Result<String> {
        match self {
            AIClient::OpenAICompatible(b) => b.categorize_transaction(description, amount).await,
            AIClient::Ollama(b) => b.categorize_transaction(description, amount).await,
            AIClient::Mock(b) => b.categorize_transaction(description, amount).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::OpenAICompatible(b) => b.health_check().await,
            AIClient::Ollama(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::OpenAICompatible(b) => b.model(),
            AIClient::Ollama(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Ollama(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}
