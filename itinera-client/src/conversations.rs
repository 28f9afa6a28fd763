//! Conversation and health endpoints

use itinera_core::domain::conversation::Conversation;
use itinera_core::dto::conversation::{ConversationDetail, ConversationSummary, CreateConversation};
use itinera_core::dto::health::HealthStatus;
use uuid::Uuid;

use crate::ItineraClient;
use crate::error::Result;

impl ItineraClient {
    /// Check API health
    pub async fn health(&self) -> Result<HealthStatus> {
        let response = self.client.get(self.url("/health")).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Conversation Management
    // =============================================================================

    /// Create a new conversation
    ///
    /// Without a title the server uses its default and later replaces it
    /// with one derived from the first message.
    pub async fn create_conversation(&self, title: Option<String>) -> Result<Conversation> {
        let response = self
            .client
            .post(self.url("/conversations"))
            .json(&CreateConversation { title })
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// List conversations, most recently updated first
    pub async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        let response = self.client.get(self.url("/conversations")).send().await?;

        self.handle_response(response).await
    }

    /// Get a conversation with its messages
    pub async fn get_conversation(&self, conversation_id: Uuid) -> Result<ConversationDetail> {
        let url = self.url(&format!("/conversations/{}", conversation_id));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Delete a conversation and its messages
    pub async fn delete_conversation(&self, conversation_id: Uuid) -> Result<()> {
        let url = self.url(&format!("/conversations/{}", conversation_id));
        let response = self.client.delete(&url).send().await?;

        self.handle_empty_response(response).await
    }
}
