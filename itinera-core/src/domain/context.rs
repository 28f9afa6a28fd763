//! Run context
//!
//! The ordered turns a stage sees when it is invoked. Each stage receives
//! this list explicitly instead of mutating a shared conversation.

use serde::{Deserialize, Serialize};

use crate::domain::message::{Message, MessageRole, USER_AUTHOR};

/// One prior turn visible to a stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "author", rename_all = "lowercase")]
pub enum ContextTurn {
    /// Content typed by the user
    User { content: String },
    /// Output produced by a named pipeline stage
    Stage { stage: String, content: String },
}

impl ContextTurn {
    pub fn user(content: impl Into<String>) -> Self {
        ContextTurn::User {
            content: content.into(),
        }
    }

    pub fn stage(stage: impl Into<String>, content: impl Into<String>) -> Self {
        ContextTurn::Stage {
            stage: stage.into(),
            content: content.into(),
        }
    }

    /// Originating stage name, or "User"
    pub fn author(&self) -> &str {
        match self {
            ContextTurn::User { .. } => USER_AUTHOR,
            ContextTurn::Stage { stage, .. } => stage,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            ContextTurn::User { content } | ContextTurn::Stage { content, .. } => content,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, ContextTurn::User { .. })
    }

    /// `[author]: content`, the form used for budgeting and prompts
    pub fn render(&self) -> String {
        format!("[{}]: {}", self.author(), self.content())
    }
}

impl From<&Message> for ContextTurn {
    fn from(message: &Message) -> Self {
        match message.role {
            MessageRole::User => ContextTurn::user(message.content.clone()),
            MessageRole::Assistant => {
                ContextTurn::stage(message.display_author(), message.content.clone())
            }
        }
    }
}
