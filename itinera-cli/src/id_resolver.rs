//! ID resolver module
//!
//! Resolves conversation id prefixes to full UUIDs by querying the API, so
//! users can type the first few characters of an id.

use anyhow::{Context, Result, anyhow};
use itinera_client::ItineraClient;
use uuid::Uuid;

use crate::types::IdOrPrefix;

/// Resolve a conversation ID or prefix to a full UUID
///
/// A full UUID is returned as is, without a round trip.
pub async fn resolve_conversation_id(
    client: &ItineraClient,
    id_or_prefix: &IdOrPrefix,
) -> Result<Uuid> {
    let prefix = match id_or_prefix {
        IdOrPrefix::Full(uuid) => return Ok(*uuid),
        IdOrPrefix::Prefix(prefix) => prefix,
    };

    let conversations = client
        .list_conversations()
        .await
        .context("Failed to fetch conversations for ID resolution")?;

    match_prefix(conversations.iter().map(|c| c.id), prefix)
}

/// Pick the single id starting with `prefix`
fn match_prefix(ids: impl IntoIterator<Item = Uuid>, prefix: &str) -> Result<Uuid> {
    if prefix.is_empty() {
        return Err(anyhow!("Conversation ID must not be empty"));
    }

    let matches: Vec<Uuid> = ids
        .into_iter()
        .filter(|id| id.to_string().starts_with(prefix))
        .collect();

    match matches.as_slice() {
        [] => Err(anyhow!(
            "No conversation found with ID starting with '{}'",
            prefix
        )),
        [id] => Ok(*id),
        _ => {
            let ids: Vec<String> = matches.iter().map(Uuid::to_string).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple conversations: {}",
                prefix,
                ids.join(", ")
            ))
        }
    }
}
