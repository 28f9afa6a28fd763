//! Itinera HTTP Client
//!
//! A type-safe HTTP client for the Itinera API. Conversation endpoints return
//! plain DTOs; sending a message returns the run's events as a stream,
//! decoded as the server pushes them.
//!
//! # Example
//!
//! ```no_run
//! use futures::StreamExt;
//! use itinera_client::ItineraClient;
//!
//! #[tokio::main]
//! async fn main() -> itinera_client::Result<()> {
//!     let client = ItineraClient::new("http://localhost:8000");
//!
//!     let conversation = client.create_conversation(None).await?;
//!     let mut events = client
//!         .send_message(conversation.id, "Three days in Lisbon")
//!         .await?;
//!
//!     while let Some(event) = events.next().await {
//!         println!("{}", event?.name());
//!     }
//!     Ok(())
//! }
//! ```

mod conversations;
pub mod error;
mod messages;
pub mod sse;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use sse::EventStream;

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the Itinera API
#[derive(Debug, Clone)]
pub struct ItineraClient {
    /// Base URL of the API (e.g., "http://localhost:8000")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl ItineraClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the API (e.g., "http://localhost:8000")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// Runs can last minutes, so avoid a whole-request timeout on the client
    /// used for `send_message`; a connect timeout is fine.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the API
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Fail with an [`ClientError::ApiError`] unless the status is a success
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(response)
    }

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response that returns no content (e.g., DELETE operations)
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        Self::check_status(response).await.map(|_| ())
    }
}
