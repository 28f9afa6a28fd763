//! Message Repository
//!
//! Handles all database operations related to conversation messages.

use chrono::{DateTime, Utc};
use itinera_core::domain::message::{Message, MessageRole, NewMessage};
use sqlx::PgPool;
use uuid::Uuid;

/// Append a message to a conversation
pub async fn create(
    pool: &PgPool,
    conversation_id: Uuid,
    message: NewMessage,
) -> Result<Message, sqlx::Error> {
    let message = Message {
        id: Uuid::new_v4(),
        conversation_id,
        role: message.role,
        author_name: message.author_name,
        content: message.content,
        step_number: message.step_number,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO messages (id, conversation_id, role, author_name, content, step_number, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(message.id)
    .bind(conversation_id)
    .bind(message.role.as_str())
    .bind(&message.author_name)
    .bind(&message.content)
    .bind(message.step_number)
    .bind(message.created_at)
    .execute(pool)
    .await?;

    Ok(message)
}

/// All messages of a conversation, oldest first
pub async fn list_by_conversation(
    pool: &PgPool,
    conversation_id: Uuid,
) -> Result<Vec<Message>, sqlx::Error> {
    let rows = sqlx::query_as::<_, MessageRow>(
        r#"
        SELECT id, conversation_id, role, author_name, content, step_number, created_at
        FROM messages
        WHERE conversation_id = $1
        ORDER BY created_at ASC, step_number ASC
        "#,
    )
    .bind(conversation_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Message::try_from).collect()
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    conversation_id: Uuid,
    role: String,
    author_name: Option<String>,
    content: String,
    step_number: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for Message {
    type Error = sqlx::Error;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let role = MessageRole::parse(&row.role).ok_or_else(|| sqlx::Error::ColumnDecode {
            index: "role".to_string(),
            source: format!("unknown message role '{}'", row.role).into(),
        })?;

        Ok(Message {
            id: row.id,
            conversation_id: row.conversation_id,
            role,
            author_name: row.author_name,
            content: row.content,
            step_number: row.step_number,
            created_at: row.created_at,
        })
    }
}
