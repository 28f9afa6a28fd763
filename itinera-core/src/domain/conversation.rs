//! Conversation domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title given to conversations created without one.
pub const DEFAULT_TITLE: &str = "New Conversation";

/// Maximum title length accepted by the store.
pub const MAX_TITLE_LEN: usize = 255;

/// A chat session grouping the messages of one planning thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub title: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Conversation {
    /// Whether the title was never replaced by one derived from user input.
    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_TITLE
    }
}

/// Derive a conversation title from the first user message.
///
/// Keeps the first 50 characters, trimmed, and appends `...` when the
/// content was longer than that.
pub fn title_from_content(content: &str) -> String {
    const TITLE_CHARS: usize = 50;

    let mut title: String = content.chars().take(TITLE_CHARS).collect();
    title = title.trim().to_string();
    if content.chars().count() > TITLE_CHARS {
        title.push_str("...");
    }
    title
}
