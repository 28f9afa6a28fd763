//! Message endpoint

use itinera_core::dto::message::SendMessage;
use reqwest::header::ACCEPT;
use uuid::Uuid;

use crate::ItineraClient;
use crate::error::Result;
use crate::sse::{EventStream, decode_events};

impl ItineraClient {
    /// Send a message and stream the pipeline run it starts
    ///
    /// Validation and lookup failures surface here as an error before any
    /// event. Once the stream is open, events are yielded as they arrive;
    /// dropping the stream closes the connection, which cancels the run
    /// server-side.
    pub async fn send_message(
        &self,
        conversation_id: Uuid,
        content: impl Into<String>,
    ) -> Result<EventStream> {
        let url = self.url(&format!("/conversations/{}/messages", conversation_id));
        let response = self
            .client
            .post(&url)
            .header(ACCEPT, "text/event-stream")
            .json(&SendMessage {
                content: content.into(),
            })
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        tracing::debug!("Event stream opened for conversation {}", conversation_id);

        Ok(decode_events(response.bytes_stream()))
    }
}
