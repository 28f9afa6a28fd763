//! Message DTOs

use serde::{Deserialize, Serialize};

/// Longest message the API accepts, in characters.
pub const MAX_CONTENT_CHARS: usize = 4096;

/// Request body for sending a message; starts a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessage {
    pub content: String,
}
