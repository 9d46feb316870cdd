use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "system")]
    System,
}

/// A single role-tagged conversation entry. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Body of `POST /chat`. The conversation is owned by the caller and threaded
/// through each request; the service never stores it.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Defaults to empty when absent so a missing field is reported as
    /// "No message provided" rather than a deserialization failure.
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub conversation: Vec<Message>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Successful reply: the assistant text plus the updated conversation
/// (input history, then the new user message, then the assistant message).
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResult {
    pub response: String,
    pub conversation: Vec<Message>,
}
