//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unavailable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Tool not found in registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool execution failed unexpectedly
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// A tool creation attempt was aborted
    #[error("Tool generation error: {0}")]
    ToolGeneration(#[from] GenerationError),

    /// The reasoner produced no usable plan
    #[error("Planning failed: {0}")]
    Planning(String),

    /// Parse error (e.g., malformed model output)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Check if error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable(_) | Self::Io(_) | Self::Http(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Provider(msg) => format!("The language model returned an error: {msg}"),
            Self::ProviderUnavailable(_) => {
                "The language model is currently unavailable. Please try again.".into()
            }
            Self::ToolNotFound(name) => format!("The tool '{name}' is not available."),
            Self::ToolExecution(msg) => format!("Tool error: {msg}"),
            Self::ToolGeneration(err) => format!("Could not create the tool: {err}"),
            Self::Planning(msg) => format!("Could not plan the objective: {msg}"),
            Self::Config(msg) => format!("Configuration problem: {msg}"),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Reasons a tool generation attempt is aborted before anything is registered
#[derive(Error, Debug)]
pub enum GenerationError {
    /// Generated code imports modules that cannot be resolved
    #[error("missing required modules: {}", .0.join(", "))]
    MissingModules(Vec<String>),

    /// Generated code does not follow the tool contract
    #[error("malformed tool source: {0}")]
    MalformedSource(String),

    /// The owning registry was dropped before the tool could be registered
    #[error("tool registry is no longer available")]
    RegistryGone,

    /// Persisting or reading the tool file failed
    #[error("tool file error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_modules_lists_every_module() {
        let err = GenerationError::MissingModules(vec!["numpy".into(), "pandas".into()]);
        assert_eq!(err.to_string(), "missing required modules: numpy, pandas");
    }

    #[test]
    fn test_user_message_for_planning() {
        let err = AgentError::Planning("could not generate a plan".into());
        assert!(err.user_message().contains("could not generate a plan"));
        assert!(!err.is_retryable());
    }
}
