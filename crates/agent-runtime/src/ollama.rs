//! Ollama LLM Provider
//!
//! Implementation of `LlmProvider` for local Ollama inference over the
//! `/api/chat` endpoint.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{GenerationOptions, LlmProvider, ResponseFormat},
};
use async_trait::async_trait;
use ollama_rs::{
    Ollama,
    error::OllamaError,
    generation::{
        chat::{ChatMessage, MessageRole, request::ChatMessageRequest},
        parameters::FormatType,
    },
    models::ModelOptions,
};

use crate::http::transport_error;

/// Ollama provider configuration
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Ollama host URL
    pub host: String,

    /// Ollama port
    pub port: u16,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Model and sampling settings
    pub options: GenerationOptions,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost".into(),
            port: 11434,
            timeout_secs: 120,
            options: GenerationOptions::default(),
        }
    }
}

impl OllamaConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let host = std::env::var("OLLAMA_HOST").unwrap_or(defaults.host);
        let port = std::env::var("OLLAMA_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);
        let model = std::env::var("OLLAMA_MODEL").unwrap_or(defaults.options.model);

        Self {
            host,
            port,
            options: GenerationOptions {
                model,
                ..defaults.options
            },
            ..defaults
        }
    }
}

/// Ollama LLM provider
pub struct OllamaProvider {
    client: Ollama,
    config: OllamaConfig,
}

impl OllamaProvider {
    /// Create a new Ollama provider with custom host/port
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        Self::from_config(OllamaConfig {
            host: host.into(),
            port,
            ..Default::default()
        })
    }

    /// Create from configuration. Fails when `host` is not an http(s) URL.
    pub fn from_config(config: OllamaConfig) -> Result<Self> {
        let url = reqwest::Url::parse(config.host.trim_end_matches('/'))
            .map_err(|e| AgentError::Config(format!("invalid Ollama host '{}': {e}", config.host)))?;
        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(AgentError::Config(format!(
                "Ollama host must be an http(s) URL, got '{}'",
                config.host
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Ok(Self {
            client: Ollama::new_with_client(url, config.port, http),
            config,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(OllamaConfig::from_env())
    }

    /// Create with default localhost settings
    pub fn localhost() -> Self {
        let config = OllamaConfig::default();
        Self {
            client: Ollama::default(),
            config,
        }
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Convert agent messages to Ollama format
    fn convert_messages(messages: &[Message]) -> Vec<ChatMessage> {
        messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => MessageRole::System,
                    Role::User => MessageRole::User,
                    Role::Assistant => MessageRole::Assistant,
                };
                ChatMessage::new(role, m.content.clone())
            })
            .collect()
    }

    /// Build Ollama generation options
    fn build_options(opts: &GenerationOptions) -> ModelOptions {
        ModelOptions::default()
            .temperature(opts.temperature)
            .num_predict(i32::try_from(opts.max_tokens).unwrap_or(i32::MAX))
    }

    fn build_request(&self, messages: &[Message], format: Option<ResponseFormat>) -> ChatMessageRequest {
        let options = &self.config.options;
        let request = ChatMessageRequest::new(options.model.clone(), Self::convert_messages(messages))
            .options(Self::build_options(options));

        match format {
            Some(ResponseFormat::Json) => request.format(FormatType::Json),
            None => request,
        }
    }

    /// Names of the locally pulled models
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let models = self.client.list_local_models().await.map_err(map_error)?;
        Ok(models.into_iter().map(|m| m.name).collect())
    }
}

fn map_error(error: OllamaError) -> AgentError {
    match error {
        OllamaError::ReqwestError(e) => transport_error(e),
        OllamaError::Other(body) => AgentError::Provider(body.trim().to_string()),
        other => AgentError::Provider(other.to_string()),
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn query(&self, messages: &[Message], format: Option<ResponseFormat>) -> Result<String> {
        tracing::debug!(
            model = %self.config.options.model,
            messages = messages.len(),
            json = format.is_some(),
            "Ollama chat request"
        );

        let response = self
            .client
            .send_chat_messages(self.build_request(messages, format))
            .await
            .map_err(map_error)?;

        Ok(response.message.content)
    }

    async fn health_check(&self) -> Result<bool> {
        match self.client.list_local_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Ollama health check failed: {}", e);
                Ok(false)
            }
        }
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = OllamaConfig::default();
        assert_eq!(config.host, "http://localhost");
        assert_eq!(config.port, 11434);
        assert_eq!(config.options.model, "llama3.2");
    }

    #[test]
    fn test_invalid_host_is_a_config_error() {
        assert!(matches!(OllamaProvider::new("not a url", 11434), Err(AgentError::Config(_))));
        assert!(matches!(OllamaProvider::new("ftp://gpu-box", 11434), Err(AgentError::Config(_))));
        assert!(OllamaProvider::new("http://gpu-box/", 8000).is_ok());
    }

    #[test]
    fn test_message_conversion() {
        let messages = vec![
            Message::system("You are helpful."),
            Message::user("Hello"),
            Message::assistant("Hi"),
        ];

        let converted = OllamaProvider::convert_messages(&messages);
        assert_eq!(converted.len(), 3);
        assert_eq!(converted[0].role, MessageRole::System);
        assert_eq!(converted[2].role, MessageRole::Assistant);
        assert_eq!(converted[1].content, "Hello");
    }

    #[test]
    fn test_request_body() {
        let provider = OllamaProvider::localhost();
        let messages = vec![Message::system("rules"), Message::user("Hello")];

        let body = serde_json::to_value(provider.build_request(&messages, Some(ResponseFormat::Json)))
            .unwrap();
        assert_eq!(body["model"], "llama3.2");
        assert_eq!(body["format"], "json");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["options"]["num_predict"], 2048);

        let plain = serde_json::to_value(provider.build_request(&messages, None)).unwrap();
        assert!(plain.get("format").is_none());
    }
}
