//! Multi-turn session context
//!
//! Turns stored conversation history into the context handed to a new run,
//! keeping the most recent messages that fit a character budget.

use itinera_core::domain::context::ContextTurn;
use itinera_core::domain::message::Message;

/// Build run context from history, newest messages first until the budget
/// is spent. Whole messages only; the result is oldest-first.
pub fn build_context(messages: &[Message], max_chars: usize) -> Vec<ContextTurn> {
    let mut kept = Vec::new();
    let mut total = 0;

    for message in messages.iter().rev() {
        let turn = ContextTurn::from(message);
        let size = turn.render().chars().count();
        if total + size > max_chars {
            break;
        }
        total += size;
        kept.push(turn);
    }

    kept.reverse();

    if !kept.is_empty() {
        tracing::debug!(
            "Built context: {} of {} messages, ~{} tokens",
            kept.len(),
            messages.len(),
            total / 4
        );
    }

    kept
}
