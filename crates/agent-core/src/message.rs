//! Conversation Messages
//!
//! Turn format shared by the agent loop, the reasoner and the providers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt, instructions and observations
    System,
    /// User input
    User,
    /// Assistant (LLM) response
    Assistant,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single turn in a conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,

    /// Text content
    pub content: String,

    /// Timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Append-only conversation history
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Get all messages
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Get the last message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::assistant("hi")).unwrap();
        assert!(json.contains(r#""role":"assistant""#));
    }

    #[test]
    fn test_conversation_is_ordered() {
        let mut conv = Conversation::new();
        conv.push(Message::user("Hi"));
        conv.push(Message::assistant("Hello!"));
        conv.push(Message::system("Observation: done"));

        assert_eq!(conv.len(), 3);
        assert_eq!(conv.messages()[0].role, Role::User);
        assert_eq!(conv.last().unwrap().role, Role::System);
    }
}
