/*!
 * Provider implementations for the language-model services.
 *
 * This module contains client implementations for various LLM providers:
 * - OpenAI: chat completions, also used for LM Studio and any compatible endpoint
 * - Anthropic: messages API
 * - Ollama: local chat API
 * - Mock: deterministic in-process provider for tests
 *
 * [`LlmClient`] wraps the concrete clients behind one chat-style call so the
 * translation services do not depend on a particular request format.
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::app_config::{TranslationConfig, TranslationProvider};
use crate::errors::ProviderError;

pub mod anthropic;
pub mod mock;
pub mod ollama;
pub mod openai;

use anthropic::{Anthropic, AnthropicRequest};
use mock::{MockProvider, MockRequest};
use ollama::{ChatMessage, ChatRequest, Ollama};
use openai::{OpenAI, OpenAIRequest};

/// Common trait for all LLM providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be used interchangeably by the translation services.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// The request type for this provider
    type Request: Send + Sync;

    /// The response type for this provider
    type Response: Send + Sync;

    /// Complete a request using this provider
    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError>;

    /// Test the connection to the provider
    async fn test_connection(&self) -> Result<(), ProviderError>;

    /// Extract text from the provider response
    fn extract_text(response: &Self::Response) -> String;
}

/// One system-plus-user exchange, independent of the wire format
#[derive(Debug, Clone, PartialEq)]
pub struct ChatPrompt {
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

impl ChatPrompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>, temperature: f32) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature,
        }
    }
}

/// A configured provider client
#[derive(Debug)]
pub enum LlmClient {
    OpenAI { client: OpenAI, model: String, max_tokens: u32 },
    Anthropic { client: Anthropic, model: String, max_tokens: u32 },
    Ollama { client: Ollama, model: String, max_tokens: u32 },
    Mock(MockProvider),
}

impl LlmClient {
    /// Build the client for the active provider of `config`
    pub fn from_config(config: &TranslationConfig) -> Self {
        let model = config.get_model();
        let endpoint = config.get_endpoint();
        let timeout_secs = config.get_timeout_secs();
        let max_tokens = config.get_max_tokens();

        match config.provider {
            TranslationProvider::OpenAI | TranslationProvider::LMStudio => Self::OpenAI {
                client: OpenAI::new_with_config(config.get_api_key(), endpoint, timeout_secs),
                model,
                max_tokens,
            },
            TranslationProvider::Anthropic => Self::Anthropic {
                client: Anthropic::new_with_config(config.get_api_key(), endpoint, timeout_secs),
                model,
                max_tokens,
            },
            TranslationProvider::Ollama => Self::Ollama {
                client: Ollama::from_url(endpoint, timeout_secs),
                model,
                max_tokens,
            },
        }
    }

    /// Provider label for log lines
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenAI { .. } => "OpenAI",
            Self::Anthropic { .. } => "Anthropic",
            Self::Ollama { .. } => "Ollama",
            Self::Mock(_) => "Mock",
        }
    }

    /// Send one prompt and return the text of the answer
    pub async fn chat(&self, prompt: &ChatPrompt) -> Result<String, ProviderError> {
        match self {
            Self::OpenAI { client, model, max_tokens } => {
                let request = OpenAIRequest::new(model.clone(), *max_tokens)
                    .add_message("system", prompt.system.clone())
                    .add_message("user", prompt.user.clone())
                    .temperature(prompt.temperature);
                let response = client.complete(request).await?;
                Ok(OpenAI::extract_text(&response))
            }
            Self::Anthropic { client, model, max_tokens } => {
                let request = AnthropicRequest::new(model.clone(), *max_tokens)
                    .system(prompt.system.clone())
                    .add_message("user", prompt.user.clone())
                    .temperature(prompt.temperature);
                let response = client.complete(request).await?;
                Ok(Anthropic::extract_text(&response))
            }
            Self::Ollama { client, model, max_tokens } => {
                let request = ChatRequest::new(
                    model.clone(),
                    vec![
                        ChatMessage::new("system", prompt.system.clone()),
                        ChatMessage::new("user", prompt.user.clone()),
                    ],
                )
                .temperature(prompt.temperature)
                .num_predict(*max_tokens);
                let response = client.complete(request).await?;
                Ok(Ollama::extract_text(&response))
            }
            Self::Mock(provider) => {
                let response = provider.complete(MockRequest::from_prompt(prompt)).await?;
                Ok(MockProvider::extract_text(&response))
            }
        }
    }

    /// Check that the provider answers at all
    pub async fn test_connection(&self) -> Result<(), ProviderError> {
        match self {
            Self::OpenAI { client, .. } => client.test_connection().await,
            Self::Anthropic { client, .. } => client.test_connection().await,
            Self::Ollama { client, .. } => client.test_connection().await,
            Self::Mock(provider) => provider.test_connection().await,
        }
    }
}

/// Read a non-success response into a typed error
pub(crate) async fn error_from_response(provider: &str, response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to get error response text".to_string());
    log::error!("{} API error ({}): {}", provider, status, body);
    ProviderError::from_status(status, body)
}
