//! Conversation Service
//!
//! Business logic for conversation management.

use itinera_core::domain::conversation::{Conversation, DEFAULT_TITLE, MAX_TITLE_LEN};
use itinera_core::dto::conversation::{ConversationDetail, ConversationSummary, CreateConversation};
use uuid::Uuid;

use crate::store::ConversationStore;

/// Service error type
#[derive(Debug)]
pub enum ConversationError {
    NotFound(Uuid),
    ValidationError(String),
    DatabaseError(sqlx::Error),
}

impl From<sqlx::Error> for ConversationError {
    fn from(err: sqlx::Error) -> Self {
        ConversationError::DatabaseError(err)
    }
}

pub type Result<T> = std::result::Result<T, ConversationError>;

/// Create a new conversation
pub async fn create_conversation(
    store: &dyn ConversationStore,
    req: CreateConversation,
) -> Result<Conversation> {
    let title = validate_title(req.title.as_deref())?;
    let conversation = store.create_conversation(&title).await?;

    tracing::info!(
        "Conversation created: {} ({})",
        conversation.title,
        conversation.id
    );

    Ok(conversation)
}

/// List all conversations, most recently active first
pub async fn list_conversations(store: &dyn ConversationStore) -> Result<Vec<ConversationSummary>> {
    let conversations = store.list_conversations().await?;
    Ok(conversations)
}

/// Get a conversation with its messages
pub async fn get_conversation(store: &dyn ConversationStore, id: Uuid) -> Result<ConversationDetail> {
    let conversation = store
        .find_conversation(id)
        .await?
        .ok_or(ConversationError::NotFound(id))?;

    let messages = store.load_context(id).await?;

    Ok(ConversationDetail::new(conversation, messages))
}

/// Delete a conversation and its messages
pub async fn delete_conversation(store: &dyn ConversationStore, id: Uuid) -> Result<()> {
    let deleted = store.delete_conversation(id).await?;

    if !deleted {
        return Err(ConversationError::NotFound(id));
    }

    tracing::info!("Conversation deleted: {}", id);

    Ok(())
}

// =============================================================================
// Validation
// =============================================================================

fn validate_title(title: Option<&str>) -> Result<String> {
    let title = match title.map(str::trim) {
        Some(t) if !t.is_empty() => t,
        _ => return Ok(DEFAULT_TITLE.to_string()),
    };

    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ConversationError::ValidationError(format!(
            "Conversation title is too long (max {} characters)",
            MAX_TITLE_LEN
        )));
    }

    Ok(title.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[test]
    fn test_validate_title_defaults() {
        assert_eq!(validate_title(None).unwrap(), DEFAULT_TITLE);
        assert_eq!(validate_title(Some("   ")).unwrap(), DEFAULT_TITLE);
        assert_eq!(validate_title(Some(" Lisbon ")).unwrap(), "Lisbon");
    }

    #[test]
    fn test_validate_title_too_long() {
        let title = "a".repeat(MAX_TITLE_LEN + 1);
        let result = validate_title(Some(&title));
        assert!(matches!(result, Err(ConversationError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_get_missing_conversation() {
        let store = MemoryStore::default();
        let id = Uuid::new_v4();

        let result = get_conversation(&store, id).await;
        assert!(matches!(result, Err(ConversationError::NotFound(missing)) if missing == id));
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let store = MemoryStore::default();
        let conversation = create_conversation(&store, CreateConversation::default())
            .await
            .unwrap();

        assert!(delete_conversation(&store, conversation.id).await.is_ok());
        assert!(matches!(
            delete_conversation(&store, conversation.id).await,
            Err(ConversationError::NotFound(_))
        ));
    }
}
