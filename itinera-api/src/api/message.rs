//! Message API Handler
//!
//! Sending a message starts a pipeline run whose events are streamed back
//! as server-sent events, one block per event:
//!
//! ```text
//! event: agent_completed
//! data: {"agent":"Researcher","step":1,"output":"..."}
//! ```

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderName, header},
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::StreamExt;
use itinera_core::domain::event::PipelineEvent;
use itinera_core::dto::message::SendMessage;
use std::convert::Infallible;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::message_service;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// POST /api/conversations/{id}/messages
pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SendMessage>,
) -> ApiResult<impl IntoResponse> {
    tracing::info!("Message received for conversation {}", id);

    let events = message_service::start_run(
        Arc::clone(&state.store),
        &state.bridge,
        state.config.context_max_chars,
        id,
        req,
    )
    .await?;

    let mut delivery = DeliveryGuard::new(id);
    let stream = events.map(move |event| {
        delivery.observe(&event);
        Ok::<_, Infallible>(sse_event(&event))
    });

    let headers = [
        (header::CACHE_CONTROL, "no-cache"),
        (X_ACCEL_BUFFERING, "no"),
    ];

    Ok((headers, Sse::new(stream).keep_alive(KeepAlive::default())))
}

fn sse_event(event: &PipelineEvent) -> Event {
    Event::default()
        .event(event.name())
        .data(event.payload().to_string())
}

/// The client went away before the run produced its terminal event
#[derive(Debug, Error)]
#[error("client disconnected from conversation {conversation_id} after {delivered} event(s)")]
pub struct StreamDeliveryError {
    pub conversation_id: Uuid,
    pub delivered: usize,
}

/// Lives exactly as long as the response stream. Dropped early, it reports
/// a [`StreamDeliveryError`]; the run itself is cancelled by the same drop.
struct DeliveryGuard {
    conversation_id: Uuid,
    delivered: usize,
    finished: bool,
}

impl DeliveryGuard {
    fn new(conversation_id: Uuid) -> Self {
        Self {
            conversation_id,
            delivered: 0,
            finished: false,
        }
    }

    fn observe(&mut self, event: &PipelineEvent) {
        self.delivered += 1;
        self.finished |= event.is_terminal();
    }
}

impl Drop for DeliveryGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let err = StreamDeliveryError {
            conversation_id: self.conversation_id,
            delivered: self.delivered,
        };
        tracing::warn!("{}; run cancelled", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_tracks_terminal_event() {
        let mut guard = DeliveryGuard::new(Uuid::nil());
        guard.observe(&PipelineEvent::RunStarted {
            run_id: Uuid::nil(),
        });
        assert!(!guard.finished);

        guard.observe(&PipelineEvent::RunFailed {
            message: "boom".to_string(),
        });
        assert!(guard.finished);
        assert_eq!(guard.delivered, 2);
    }
}
