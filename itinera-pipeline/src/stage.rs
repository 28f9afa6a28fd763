//! Stage definitions and the invocation seam used by the bridge

use async_trait::async_trait;
use itinera_core::domain::context::ContextTurn;
use itinera_core::domain::run::StageResult;

use crate::error::StageInvocationError;
use crate::tools::ToolSession;

/// A named stage of the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDefinition {
    pub name: String,
    /// System instructions handed to the backend
    pub instructions: String,
    /// Whether the stage may call tools from the run's tool lease
    pub uses_tools: bool,
}

impl StageDefinition {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            uses_tools: false,
        }
    }

    pub fn with_tools(mut self) -> Self {
        self.uses_tools = true;
        self
    }
}

/// Everything a single stage invocation gets to see
#[derive(Clone, Copy)]
pub struct StageRequest<'a> {
    pub stage_name: &'a str,
    pub step: u32,
    pub context: &'a [ContextTurn],
    pub tools: Option<&'a dyn ToolSession>,
}

impl std::fmt::Debug for StageRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRequest")
            .field("stage_name", &self.stage_name)
            .field("step", &self.step)
            .field("context_turns", &self.context.len())
            .field("tools", &self.tools.is_some())
            .finish()
    }
}

/// Invokes one stage of the pipeline.
///
/// The bridge depends only on this trait, so any engine that can answer
/// `(stage, context) -> content` can drive a run.
#[async_trait]
pub trait StageInvoker: Send + Sync {
    async fn invoke(&self, request: StageRequest<'_>) -> Result<StageResult, StageInvocationError>;
}
