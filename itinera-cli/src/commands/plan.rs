//! Plan command
//!
//! Sends a message and renders the pipeline run as its events arrive.

use anyhow::{Context, Result, bail};
use colored::*;
use futures::StreamExt;
use itinera_client::ItineraClient;
use itinera_core::domain::event::PipelineEvent;
use uuid::Uuid;

use crate::config::Config;
use crate::id_resolver::resolve_conversation_id;
use crate::types::IdOrPrefix;

/// Run the planner for `message`, in a new conversation unless one is given
pub async fn handle_plan_command(
    message: String,
    conversation: Option<String>,
    config: &Config,
) -> Result<()> {
    let client = ItineraClient::new(&config.api_url);

    let conversation_id = match conversation {
        Some(id) => resolve_conversation_id(&client, &IdOrPrefix::parse(&id)).await?,
        None => {
            let created = client.create_conversation(None).await?;
            println!(
                "{}",
                format!("Started conversation {}", created.id).dimmed()
            );
            created.id
        }
    };

    let mut events = client
        .send_message(conversation_id, message)
        .await
        .with_context(|| format!("Failed to start a run in conversation {}", conversation_id))?;

    let mut terminal = None;
    while let Some(event) = events.next().await {
        let event = event.context("Event stream broke off")?;
        print_event(&event);
        if event.is_terminal() {
            terminal = Some(event);
            break;
        }
    }

    outcome(terminal.as_ref(), conversation_id)
}

/// Map the last event of a run to the command's result
fn outcome(terminal: Option<&PipelineEvent>, conversation_id: Uuid) -> Result<()> {
    match terminal {
        Some(PipelineEvent::RunCompleted { .. }) => {
            println!(
                "{}",
                format!("Continue with: itinera plan --conversation {} \"...\"", conversation_id)
                    .dimmed()
            );
            Ok(())
        }
        Some(PipelineEvent::RunFailed { message }) => bail!("Pipeline failed: {}", message),
        _ => bail!("Event stream ended before the pipeline finished"),
    }
}

fn print_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::RunStarted { run_id } => {
            println!("{}", format!("Run {}", run_id).dimmed());
        }
        PipelineEvent::StageStarted { stage_name, step } => {
            println!(
                "{} {} {}",
                format!("[{}]", step).dimmed(),
                stage_name.cyan().bold(),
                "working...".dimmed()
            );
        }
        PipelineEvent::StageCompleted {
            stage_name,
            step,
            output,
        } => {
            println!(
                "{} {} {}",
                format!("[{}]", step).dimmed(),
                stage_name.cyan().bold(),
                "done".green()
            );
            println!("{}", "─".repeat(80).dimmed());
            println!("{}", output);
            println!("{}", "─".repeat(80).dimmed());
        }
        PipelineEvent::RunCompleted { .. } => {
            println!("{}", "✓ Plan ready".green().bold());
        }
        PipelineEvent::RunFailed { message } => {
            println!("{} {}", "✗".red(), message.red());
        }
    }
}
