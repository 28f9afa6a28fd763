//! Error types for pipeline execution

use itinera_core::dto::rpc::RpcError;
use std::time::Duration;
use thiserror::Error;

/// A stage call failed, timed out, or returned unusable output.
///
/// The bridge converts this into a terminal `error` event; it never
/// escapes the event stream.
#[derive(Debug, Error)]
pub enum StageInvocationError {
    #[error("stage '{stage}' timed out after {}s", timeout.as_secs())]
    Timeout { stage: String, timeout: Duration },

    #[error("stage '{stage}' returned no usable output")]
    EmptyOutput { stage: String },

    #[error("stage '{stage}' is not configured")]
    UnknownStage { stage: String },

    #[error("stage '{stage}' failed: {message}")]
    Failed { stage: String, message: String },

    #[error("tool connection failed: {0}")]
    ToolsUnavailable(#[from] ToolError),
}

/// A malformed stage list. Raised at construction, before any run starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BridgeConfigError {
    #[error("pipeline must have at least one stage")]
    EmptyStageList,

    #[error("stage at position {0} has a blank name")]
    BlankStageName(usize),

    #[error("stage '{0}' appears more than once")]
    DuplicateStage(String),
}

/// Errors talking to the external tool server
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool server request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("tool server returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("tool server did not answer within {}s", .0.as_secs_f32())]
    Timeout(Duration),

    #[error("tool server protocol error: {0}")]
    Protocol(String),

    #[error("tool server rejected the request: {0}")]
    Rpc(#[from] RpcError),

    #[error("tool '{tool}' failed: {message}")]
    ToolFailed { tool: String, message: String },
}
