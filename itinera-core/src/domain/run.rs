//! Pipeline run domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }

    /// Whether a run in this status may move to `next`
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        match (self, next) {
            (RunStatus::Pending, RunStatus::Running) => true,
            (RunStatus::Pending, RunStatus::Cancelled) => true,
            (RunStatus::Running, RunStatus::Completed) => true,
            (RunStatus::Running, RunStatus::Failed) => true,
            (RunStatus::Running, RunStatus::Cancelled) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Pending => write!(f, "pending"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
            RunStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One invocation of the pipeline against one input.
///
/// The stage list is fixed when the run is created. `current_stage` is the
/// zero-based index of the next stage to run and only moves forward.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    id: Uuid,
    stages: Vec<String>,
    current_stage: usize,
    status: RunStatus,
}

impl PipelineRun {
    pub fn new(stages: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            stages,
            current_stage: 0,
            status: RunStatus::Pending,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn stages(&self) -> &[String] {
        &self.stages
    }

    pub fn current_stage(&self) -> usize {
        self.current_stage
    }

    /// Name of the stage at `index`, if the pipeline has one
    pub fn stage(&self, index: usize) -> Option<&str> {
        self.stages.get(index).map(String::as_str)
    }

    /// Move past the current stage after it completed
    pub fn advance(&mut self) {
        if self.status == RunStatus::Running && self.current_stage < self.stages.len() {
            self.current_stage += 1;
        }
    }

    pub fn start(&mut self) -> bool {
        self.transition(RunStatus::Running)
    }

    pub fn complete(&mut self) -> bool {
        self.transition(RunStatus::Completed)
    }

    pub fn fail(&mut self) -> bool {
        self.transition(RunStatus::Failed)
    }

    pub fn cancel(&mut self) -> bool {
        self.transition(RunStatus::Cancelled)
    }

    fn transition(&mut self, next: RunStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        true
    }
}

/// Completion status of a stage invocation
///
/// Only finished stages produce a [`StageResult`]; a failing stage ends the
/// run with `RunFailed` and leaves no result behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Completed,
}

/// Output of one stage. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage_name: String,
    /// 1-based position in the pipeline
    pub step: u32,
    pub content: String,
    pub status: StageStatus,
    pub elapsed_ms: u64,
}

impl StageResult {
    pub fn completed(
        stage_name: impl Into<String>,
        step: u32,
        content: impl Into<String>,
        elapsed: std::time::Duration,
    ) -> Self {
        Self {
            stage_name: stage_name.into(),
            step,
            content: content.into(),
            status: StageStatus::Completed,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}
