//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod conversation;
mod plan;

pub use conversation::ConversationCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Conversation management
    Conversation {
        #[command(subcommand)]
        command: ConversationCommands,
    },
    /// Ask the planner for a trip and follow the run live
    Plan {
        /// What to plan, e.g. "Three days in Lisbon in May"
        message: String,

        /// Continue an existing conversation (ID or unambiguous prefix)
        #[arg(short, long)]
        conversation: Option<String>,
    },
    /// Check that the API is reachable
    Health,
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Conversation { command } => {
            conversation::handle_conversation_command(command, config).await
        }
        Commands::Plan {
            message,
            conversation,
        } => plan::handle_plan_command(message, conversation, config).await,
        Commands::Health => conversation::check_health(config).await,
    }
}
