//! llama.cpp server provider
//!
//! Talks to `llama-server` (or any OpenAI-compatible server) through
//! `/v1/chat/completions`. This is the way to run a local GGUF model.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::Message,
    provider::{GenerationOptions, LlmProvider, ResponseFormat},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::http::{WireMessage, check_status, transport_error};

/// llama.cpp server configuration
#[derive(Clone, Debug)]
pub struct LlamaCppConfig {
    /// Server base URL, e.g. `http://localhost:8080`
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Model and sampling settings. llama-server ignores the model name
    /// unless it serves several models.
    pub options: GenerationOptions,
}

impl Default for LlamaCppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".into(),
            timeout_secs: 300,
            options: GenerationOptions {
                model: "local".into(),
                ..Default::default()
            },
        }
    }
}

impl LlamaCppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let base_url = std::env::var("LLAMACPP_URL").unwrap_or(defaults.base_url);
        let model = std::env::var("LLAMACPP_MODEL").unwrap_or(defaults.options.model);

        Self {
            base_url,
            options: GenerationOptions {
                model,
                ..defaults.options
            },
            ..defaults
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormatBody>,
}

#[derive(Serialize)]
struct ResponseFormatBody {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible llama.cpp provider
pub struct LlamaCppProvider {
    client: reqwest::Client,
    config: LlamaCppConfig,
}

impl LlamaCppProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::from_config(LlamaCppConfig {
            base_url: base_url.into(),
            ..Default::default()
        })
    }

    pub fn from_config(config: LlamaCppConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self { client, config }
    }

    pub fn from_env() -> Self {
        Self::from_config(LlamaCppConfig::from_env())
    }

    pub fn config(&self) -> &LlamaCppConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn build_request<'a>(
        &'a self,
        messages: &'a [Message],
        format: Option<ResponseFormat>,
    ) -> CompletionRequest<'a> {
        let options = &self.config.options;
        CompletionRequest {
            model: &options.model,
            messages: messages.iter().map(WireMessage::from).collect(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream: false,
            response_format: format.map(|ResponseFormat::Json| ResponseFormatBody {
                kind: "json_object",
            }),
        }
    }

    fn first_content(body: CompletionResponse) -> Result<String> {
        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| AgentError::Provider("completion has no choices".into()))
    }
}

#[async_trait]
impl LlmProvider for LlamaCppProvider {
    async fn query(&self, messages: &[Message], format: Option<ResponseFormat>) -> Result<String> {
        let request = self.build_request(messages, format);

        tracing::debug!(
            url = %self.config.base_url,
            messages = messages.len(),
            json = format.is_some(),
            "llama.cpp completion request"
        );

        let response = self
            .client
            .post(self.url("/v1/chat/completions"))
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;
        let body: CompletionResponse = check_status(response).await?.json().await.map_err(|e| {
            AgentError::Provider(format!("unexpected llama.cpp response: {e}"))
        })?;

        Self::first_content(body)
    }

    async fn health_check(&self) -> Result<bool> {
        match self.client.get(self.url("/health")).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                tracing::warn!("llama.cpp health check failed: {}", e);
                Ok(false)
            }
        }
    }

    fn name(&self) -> &str {
        "llamacpp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body() {
        let provider = LlamaCppProvider::new("http://127.0.0.1:8080/");
        let messages = vec![Message::system("rules"), Message::user("hi")];

        let body = serde_json::to_value(provider.build_request(&messages, Some(ResponseFormat::Json)))
            .unwrap();
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["max_tokens"], 2048);

        let plain = serde_json::to_value(provider.build_request(&messages, None)).unwrap();
        assert!(plain.get("response_format").is_none());
        assert_eq!(provider.url("/health"), "http://127.0.0.1:8080/health");
    }

    #[test]
    fn test_first_content() {
        let body: CompletionResponse = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"{\"plan\":[]}"}}]}"#,
        )
        .unwrap();
        assert_eq!(LlamaCppProvider::first_content(body).unwrap(), r#"{"plan":[]}"#);

        let empty: CompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(LlamaCppProvider::first_content(empty).is_err());
    }
}
