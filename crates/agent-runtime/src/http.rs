//! HTTP plumbing for the OpenAI-style llama.cpp client

use agent_core::{
    error::AgentError,
    message::{Message, Role},
};
use serde::Serialize;

/// Chat message as OpenAI-style servers expect it
#[derive(Serialize)]
pub(crate) struct WireMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

impl<'a> From<&'a Message> for WireMessage<'a> {
    fn from(message: &'a Message) -> Self {
        let role = match message.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        Self {
            role,
            content: &message.content,
        }
    }
}

/// Connect and timeout failures map to `ProviderUnavailable`
pub(crate) fn transport_error(e: reqwest::Error) -> AgentError {
    if e.is_connect() || e.is_timeout() {
        AgentError::ProviderUnavailable(e.to_string())
    } else {
        AgentError::Http(e)
    }
}

/// Turn a non-2xx answer into a provider error carrying the body
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AgentError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(AgentError::Provider(format!("HTTP {status}: {}", body.trim())))
}
