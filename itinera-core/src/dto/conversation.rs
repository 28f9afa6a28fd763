//! Conversation DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::conversation::Conversation;
use crate::domain::message::Message;

/// Request to create a new conversation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateConversation {
    #[serde(default)]
    pub title: Option<String>,
}

/// Conversation list item (without messages)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub title: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub message_count: i64,
}

/// Full conversation with its ordered messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationDetail {
    pub id: Uuid,
    pub title: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub messages: Vec<Message>,
}

impl ConversationDetail {
    pub fn new(conversation: Conversation, messages: Vec<Message>) -> Self {
        ConversationDetail {
            id: conversation.id,
            title: conversation.title,
            created_at: conversation.created_at,
            updated_at: conversation.updated_at,
            messages,
        }
    }
}
