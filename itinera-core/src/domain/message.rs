//! Message domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Author name recorded for messages typed by the user.
pub const USER_AUTHOR: &str = "User";

/// A single persisted message within a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: MessageRole,
    pub author_name: Option<String>,
    pub content: String,
    /// Pipeline step that produced the message; 0 for user messages.
    pub step_number: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Message {
    /// Name shown next to the message, falling back to the role.
    pub fn display_author(&self) -> &str {
        match &self.author_name {
            Some(name) if !name.trim().is_empty() => name,
            _ => self.role.label(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            MessageRole::User => "User",
            MessageRole::Assistant => "Assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message about to be appended to a conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub role: MessageRole,
    pub author_name: Option<String>,
    pub content: String,
    pub step_number: i32,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            author_name: Some(USER_AUTHOR.to_string()),
            content: content.into(),
            step_number: 0,
        }
    }

    pub fn stage(stage_name: impl Into<String>, step: u32, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            author_name: Some(stage_name.into()),
            content: content.into(),
            step_number: i32::try_from(step).unwrap_or(i32::MAX),
        }
    }
}
