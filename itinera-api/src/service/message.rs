//! Message Service
//!
//! Accepts a user message, starts a pipeline run for it and records what
//! the run produces while the events stream out.

use futures::StreamExt;
use itinera_core::domain::conversation::title_from_content;
use itinera_core::domain::event::PipelineEvent;
use itinera_core::domain::message::NewMessage;
use itinera_core::dto::message::{MAX_CONTENT_CHARS, SendMessage};
use itinera_pipeline::{EventStream, PipelineBridge};
use std::sync::Arc;
use uuid::Uuid;

use crate::service::session;
use crate::store::ConversationStore;

/// Service error type
#[derive(Debug)]
pub enum MessageError {
    ConversationNotFound(Uuid),
    ValidationError(String),
    DatabaseError(sqlx::Error),
}

impl From<sqlx::Error> for MessageError {
    fn from(err: sqlx::Error) -> Self {
        MessageError::DatabaseError(err)
    }
}

pub type Result<T> = std::result::Result<T, MessageError>;

/// Record the user message and start a run for it.
///
/// Everything that can be rejected is checked here, before the first event
/// exists. The returned stream persists stage outputs as they pass through.
pub async fn start_run(
    store: Arc<dyn ConversationStore>,
    bridge: &PipelineBridge,
    context_max_chars: usize,
    conversation_id: Uuid,
    req: SendMessage,
) -> Result<EventStream> {
    validate_content(&req.content)?;

    let conversation = store
        .find_conversation(conversation_id)
        .await?
        .ok_or(MessageError::ConversationNotFound(conversation_id))?;

    // History must be read before the new message is written
    let history = store.load_context(conversation_id).await?;

    store
        .append_message(conversation_id, NewMessage::user(&req.content))
        .await?;

    // The message is already stored; a missed title must not fail the run
    if conversation.has_default_title() {
        let title = title_from_content(&req.content);
        match store.rename_conversation(conversation_id, &title).await {
            Ok(_) => tracing::debug!("Conversation {} titled '{}'", conversation_id, title),
            Err(e) => tracing::warn!(
                "Failed to title conversation {}: {}",
                conversation_id,
                e
            ),
        }
    }

    let context = session::build_context(&history, context_max_chars);
    tracing::info!(
        "Starting run for conversation {} ({} context turns)",
        conversation_id,
        context.len()
    );

    let events = bridge.run(req.content, context);
    Ok(persist_events(store, conversation_id, events))
}

/// Write stage outputs and completion to the store as events go by.
///
/// Store failures are logged and never interrupt the stream.
fn persist_events(
    store: Arc<dyn ConversationStore>,
    conversation_id: Uuid,
    events: EventStream,
) -> EventStream {
    events
        .then(move |event| {
            let store = Arc::clone(&store);
            async move {
                record_event(store.as_ref(), conversation_id, &event).await;
                event
            }
        })
        .boxed()
}

async fn record_event(store: &dyn ConversationStore, conversation_id: Uuid, event: &PipelineEvent) {
    match event {
        PipelineEvent::StageCompleted {
            stage_name,
            step,
            output,
        } => {
            if output.trim().is_empty() {
                return;
            }
            let message = NewMessage::stage(stage_name, *step, output);
            if let Err(e) = store.append_message(conversation_id, message).await {
                tracing::warn!(
                    "Failed to save {} output for conversation {}: {}",
                    stage_name,
                    conversation_id,
                    e
                );
            }
        }
        PipelineEvent::RunCompleted { .. } => {
            if let Err(e) = store.touch_conversation(conversation_id).await {
                tracing::warn!("Failed to touch conversation {}: {}", conversation_id, e);
            }
        }
        _ => {}
    }
}

// =============================================================================
// Validation
// =============================================================================

fn validate_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(MessageError::ValidationError(
            "Message content cannot be empty".to_string(),
        ));
    }

    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(MessageError::ValidationError(format!(
            "Message content is too long (max {} characters)",
            MAX_CONTENT_CHARS
        )));
    }

    Ok(())
}
