//! Conversation command handlers
//!
//! Handles listing, viewing, creating and deleting conversations.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use itinera_client::ItineraClient;
use itinera_core::domain::message::{Message, MessageRole};
use itinera_core::dto::conversation::ConversationSummary;

use crate::config::Config;
use crate::id_resolver::resolve_conversation_id;
use crate::types::IdOrPrefix;

/// Conversation subcommands
#[derive(Subcommand)]
pub enum ConversationCommands {
    /// List all conversations
    List,
    /// Show a conversation and its messages
    Show {
        /// Conversation ID or unambiguous prefix
        id: String,
    },
    /// Create an empty conversation
    Create {
        /// Title (defaults to one derived from the first message)
        #[arg(short, long)]
        title: Option<String>,
    },
    /// Delete a conversation and its messages
    Delete {
        /// Conversation ID or unambiguous prefix
        id: String,
    },
}

/// Handle conversation commands
pub async fn handle_conversation_command(
    command: ConversationCommands,
    config: &Config,
) -> Result<()> {
    let client = ItineraClient::new(&config.api_url);

    match command {
        ConversationCommands::List => list_conversations(&client).await,
        ConversationCommands::Show { id } => show_conversation(&client, &id).await,
        ConversationCommands::Create { title } => create_conversation(&client, title).await,
        ConversationCommands::Delete { id } => delete_conversation(&client, &id).await,
    }
}

/// Print the API health status
pub async fn check_health(config: &Config) -> Result<()> {
    let client = ItineraClient::new(&config.api_url);
    let health = client
        .health()
        .await
        .with_context(|| format!("API at {} is not reachable", client.base_url()))?;

    println!(
        "{} {} is {}",
        "✓".green(),
        health.service.bold(),
        health.status.green()
    );
    Ok(())
}

/// List all conversations
async fn list_conversations(client: &ItineraClient) -> Result<()> {
    let conversations = client.list_conversations().await?;

    if conversations.is_empty() {
        println!("{}", "No conversations found.".yellow());
    } else {
        println!(
            "{}",
            format!("Found {} conversation(s):", conversations.len()).bold()
        );
        println!();
        for conversation in conversations {
            print_conversation_summary(&conversation);
        }
    }

    Ok(())
}

/// Show one conversation with its messages
async fn show_conversation(client: &ItineraClient, id: &str) -> Result<()> {
    let uuid = resolve_conversation_id(client, &IdOrPrefix::parse(id)).await?;
    let detail = client.get_conversation(uuid).await?;

    println!("{}", detail.title.bold());
    println!("  ID:      {}", detail.id.to_string().cyan());
    println!(
        "  Created: {}",
        detail.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!(
        "  Updated: {}",
        detail.updated_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!();

    if detail.messages.is_empty() {
        println!("{}", "No messages yet.".yellow());
    }
    for message in &detail.messages {
        print_message(message);
    }

    Ok(())
}

/// Create an empty conversation
async fn create_conversation(client: &ItineraClient, title: Option<String>) -> Result<()> {
    let conversation = client.create_conversation(title).await?;

    println!("{}", "✓ Conversation created".green());
    println!("  ID:    {}", conversation.id.to_string().cyan());
    println!("  Title: {}", conversation.title);

    Ok(())
}

/// Delete a conversation
async fn delete_conversation(client: &ItineraClient, id: &str) -> Result<()> {
    let uuid = resolve_conversation_id(client, &IdOrPrefix::parse(id)).await?;

    client
        .delete_conversation(uuid)
        .await
        .with_context(|| format!("Failed to delete conversation {}", uuid))?;

    println!(
        "{}",
        format!("✓ Conversation {} deleted", uuid).green()
    );
    Ok(())
}

fn print_conversation_summary(conversation: &ConversationSummary) {
    println!(
        "  {} {}",
        "▸".cyan(),
        conversation.title.bold()
    );
    println!("    ID:       {}", conversation.id.to_string().dimmed());
    println!("    Messages: {}", conversation.message_count);
    println!(
        "    Updated:  {}",
        conversation
            .updated_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    println!();
}

fn print_message(message: &Message) {
    let author = match message.role {
        MessageRole::User => message.display_author().cyan().bold(),
        MessageRole::Assistant => {
            format!("{} (step {})", message.display_author(), message.step_number)
                .magenta()
                .bold()
        }
    };

    println!(
        "{} {}",
        message
            .created_at
            .format("%H:%M:%S")
            .to_string()
            .dimmed(),
        author
    );
    println!("{}", message.content);
    println!();
}
