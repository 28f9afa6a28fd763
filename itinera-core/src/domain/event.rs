//! Pipeline events and their wire contract
//!
//! Every run produces an ordered stream of [`PipelineEvent`]s. On the wire
//! each event is one text block:
//!
//! ```text
//! event: agent_started
//! data: {"agent":"Researcher","step":1}
//!
//! ```
//!
//! The event names and payload field names are what consumers rely on;
//! they are pinned by the serde attributes below.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Typed lifecycle event of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum PipelineEvent {
    #[serde(rename = "workflow_started")]
    RunStarted {
        #[serde(rename = "workflow_id")]
        run_id: Uuid,
    },
    #[serde(rename = "agent_started")]
    StageStarted {
        #[serde(rename = "agent")]
        stage_name: String,
        step: u32,
    },
    #[serde(rename = "agent_completed")]
    StageCompleted {
        #[serde(rename = "agent")]
        stage_name: String,
        step: u32,
        output: String,
    },
    #[serde(rename = "workflow_completed")]
    RunCompleted { final_output: String },
    #[serde(rename = "error")]
    RunFailed { message: String },
}

/// Failure to turn a received event block back into a [`PipelineEvent`]
#[derive(Debug, Error)]
pub enum EventDecodeError {
    #[error("unknown event name '{0}'")]
    UnknownEvent(String),

    #[error("event '{name}' has a malformed payload: {source}")]
    MalformedPayload {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

const EVENT_NAMES: [&str; 5] = [
    "workflow_started",
    "agent_started",
    "agent_completed",
    "workflow_completed",
    "error",
];

impl PipelineEvent {
    /// Wire event name
    pub fn name(&self) -> &'static str {
        match self {
            PipelineEvent::RunStarted { .. } => "workflow_started",
            PipelineEvent::StageStarted { .. } => "agent_started",
            PipelineEvent::StageCompleted { .. } => "agent_completed",
            PipelineEvent::RunCompleted { .. } => "workflow_completed",
            PipelineEvent::RunFailed { .. } => "error",
        }
    }

    /// Whether this event ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineEvent::RunCompleted { .. } | PipelineEvent::RunFailed { .. }
        )
    }

    /// Step number carried by stage events
    pub fn step(&self) -> Option<u32> {
        match self {
            PipelineEvent::StageStarted { step, .. } | PipelineEvent::StageCompleted { step, .. } => {
                Some(*step)
            }
            _ => None,
        }
    }

    /// JSON payload sent in the `data:` line (the event name is not repeated)
    pub fn payload(&self) -> serde_json::Value {
        let Ok(serde_json::Value::Object(mut fields)) = serde_json::to_value(self) else {
            return serde_json::Value::Null;
        };
        fields.remove("event");
        serde_json::Value::Object(fields)
    }

    /// Encode as one server-push block terminated by a blank line
    pub fn to_sse_block(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.name(), self.payload())
    }

    /// Decode an event from its wire name and `data:` payload
    pub fn from_wire(name: &str, data: &str) -> Result<Self, EventDecodeError> {
        if !EVENT_NAMES.contains(&name) {
            return Err(EventDecodeError::UnknownEvent(name.to_string()));
        }

        let malformed = |source| EventDecodeError::MalformedPayload {
            name: name.to_string(),
            source,
        };

        let mut value: serde_json::Value = serde_json::from_str(data).map_err(malformed)?;
        if let Some(fields) = value.as_object_mut() {
            fields.insert(
                "event".to_string(),
                serde_json::Value::String(name.to_string()),
            );
        }
        serde_json::from_value(value).map_err(malformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_field_names() {
        let id = Uuid::new_v4();
        let started = PipelineEvent::RunStarted { run_id: id };
        assert_eq!(started.payload(), json!({ "workflow_id": id.to_string() }));

        let stage = PipelineEvent::StageCompleted {
            stage_name: "Researcher".to_string(),
            step: 1,
            output: "Brief".to_string(),
        };
        assert_eq!(
            stage.payload(),
            json!({ "agent": "Researcher", "step": 1, "output": "Brief" })
        );

        let done = PipelineEvent::RunCompleted {
            final_output: "Plan".to_string(),
        };
        assert_eq!(done.payload(), json!({ "final_output": "Plan" }));

        let failed = PipelineEvent::RunFailed {
            message: "timed out".to_string(),
        };
        assert_eq!(failed.name(), "error");
        assert_eq!(failed.payload(), json!({ "message": "timed out" }));
    }

    #[test]
    fn test_sse_block_shape() {
        let event = PipelineEvent::StageStarted {
            stage_name: "Planner".to_string(),
            step: 3,
        };
        assert_eq!(
            event.to_sse_block(),
            "event: agent_started\ndata: {\"agent\":\"Planner\",\"step\":3}\n\n"
        );
    }

    #[test]
    fn test_from_wire_reads_payload() {
        let event =
            PipelineEvent::from_wire("agent_started", r#"{"agent":"WeatherAnalyst","step":2}"#)
                .unwrap();
        assert_eq!(
            event,
            PipelineEvent::StageStarted {
                stage_name: "WeatherAnalyst".to_string(),
                step: 2,
            }
        );
        assert_eq!(event.step(), Some(2));
    }

    #[test]
    fn test_from_wire_rejects_unknown_name() {
        let result = PipelineEvent::from_wire("agent_progress", "{}");
        assert!(matches!(result, Err(EventDecodeError::UnknownEvent(_))));
    }

    #[test]
    fn test_from_wire_rejects_missing_fields() {
        let result = PipelineEvent::from_wire("agent_completed", r#"{"agent":"Planner"}"#);
        assert!(matches!(
            result,
            Err(EventDecodeError::MalformedPayload { .. })
        ));
    }

    #[test]
    fn test_terminal_events() {
        assert!(PipelineEvent::RunFailed { message: String::new() }.is_terminal());
        assert!(
            PipelineEvent::RunCompleted {
                final_output: String::new()
            }
            .is_terminal()
        );
        assert!(!PipelineEvent::RunStarted { run_id: Uuid::nil() }.is_terminal());
    }
}
