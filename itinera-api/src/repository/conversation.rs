//! Conversation Repository
//!
//! Handles all database operations related to conversations.

use chrono::{DateTime, Utc};
use itinera_core::domain::conversation::Conversation;
use itinera_core::dto::conversation::ConversationSummary;
use sqlx::PgPool;
use uuid::Uuid;

/// Create a new conversation in the database
pub async fn create(pool: &PgPool, title: &str) -> Result<Conversation, sqlx::Error> {
    let now = Utc::now();
    let conversation = Conversation {
        id: Uuid::new_v4(),
        title: title.to_string(),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO conversations (id, title, created_at, updated_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(conversation.id)
    .bind(&conversation.title)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(conversation)
}

/// Find a conversation by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Conversation>, sqlx::Error> {
    let row = sqlx::query_as::<_, ConversationRow>(
        r#"
        SELECT id, title, created_at, updated_at
        FROM conversations
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// List all conversations with their message counts, most recently active first
pub async fn list_summaries(pool: &PgPool) -> Result<Vec<ConversationSummary>, sqlx::Error> {
    let rows = sqlx::query_as::<_, SummaryRow>(
        r#"
        SELECT c.id, c.title, c.created_at, c.updated_at, COUNT(m.id) AS message_count
        FROM conversations c
        LEFT JOIN messages m ON m.conversation_id = c.id
        GROUP BY c.id
        ORDER BY c.updated_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Replace a conversation's title
pub async fn rename(pool: &PgPool, id: Uuid, title: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE conversations SET title = $1, updated_at = $2 WHERE id = $3")
        .bind(title)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Mark a conversation as active now
pub async fn touch(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE conversations SET updated_at = $1 WHERE id = $2")
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a conversation by ID (messages cascade)
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM conversations WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ConversationRow {
    id: Uuid,
    title: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Conversation {
            id: row.id,
            title: row.title,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: Uuid,
    title: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    message_count: i64,
}

impl From<SummaryRow> for ConversationSummary {
    fn from(row: SummaryRow) -> Self {
        ConversationSummary {
            id: row.id,
            title: row.title,
            created_at: row.created_at,
            updated_at: row.updated_at,
            message_count: row.message_count,
        }
    }
}
