//! Pipeline event bridge
//!
//! Drives the stages of one run strictly in order and exposes the run as a
//! lazy stream of [`PipelineEvent`]s:
//!
//! ```text
//! workflow_started
//! agent_started(1)   agent_completed(1)
//! ...
//! agent_started(N)   agent_completed(N)
//! workflow_completed | error
//! ```
//!
//! Nothing runs until the consumer polls, and each poll produces at most
//! one event, so a slow consumer holds the run back instead of letting
//! events pile up. Dropping the stream cancels the run: the in-flight stage
//! call is dropped and the tool lease is released with the run state.

use futures::stream::{self, BoxStream, StreamExt};
use itinera_core::domain::context::ContextTurn;
use itinera_core::domain::event::PipelineEvent;
use itinera_core::domain::run::{PipelineRun, StageResult};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::error::{BridgeConfigError, StageInvocationError, ToolError};
use crate::stage::{StageInvoker, StageRequest};
use crate::tools::{ToolConnector, ToolSession};

/// Ordered, finite stream of events for one run
pub type EventStream = BoxStream<'static, PipelineEvent>;

/// Longest a run waits for its tool session before failing
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Converts a sequential stage pipeline into event streams, one per run.
///
/// The bridge itself holds no per-run state; every call to
/// [`run`](PipelineBridge::run) starts from scratch, so concurrent runs are
/// fully independent.
#[derive(Clone)]
pub struct PipelineBridge {
    stages: Arc<[String]>,
    invoker: Arc<dyn StageInvoker>,
    tools: Option<Arc<dyn ToolConnector>>,
    tool_timeout: Duration,
}

impl PipelineBridge {
    /// Create a bridge over a fixed stage list.
    ///
    /// Fails if the list is empty, contains a blank name, or names a stage
    /// twice.
    pub fn new(
        stages: Vec<String>,
        invoker: Arc<dyn StageInvoker>,
    ) -> Result<Self, BridgeConfigError> {
        validate_stages(&stages)?;

        Ok(Self {
            stages: stages.into(),
            invoker,
            tools: None,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        })
    }

    /// Lease a tool session from `connector` for the duration of every run
    pub fn with_tools(mut self, connector: Arc<dyn ToolConnector>) -> Self {
        self.tools = Some(connector);
        self
    }

    /// Bound on acquiring the tool session; an expired wait fails the run
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn stages(&self) -> &[String] {
        &self.stages
    }

    /// Start a run for `input` on top of the prior `context`.
    ///
    /// The returned stream is lazy and cannot be restarted.
    pub fn run(&self, input: impl Into<String>, context: Vec<ContextTurn>) -> EventStream {
        let mut turns = context;
        turns.push(ContextTurn::user(input));

        let run = PipelineRun::new(self.stages.to_vec());
        let span = info_span!("pipeline_run", run_id = %run.id(), stages = self.stages.len());

        let state = RunState {
            run,
            phase: Phase::Begin,
            context: turns,
            results: Vec::new(),
            invoker: Arc::clone(&self.invoker),
            connector: self.tools.clone(),
            tool_timeout: self.tool_timeout,
            lease: None,
            span,
        };

        stream::unfold(state, |mut state| async move {
            let event = state.next_event().await?;
            Some((event, state))
        })
        .boxed()
    }
}

fn validate_stages(stages: &[String]) -> Result<(), BridgeConfigError> {
    if stages.is_empty() {
        return Err(BridgeConfigError::EmptyStageList);
    }

    let mut seen = HashSet::new();
    for (i, name) in stages.iter().enumerate() {
        if name.trim().is_empty() {
            return Err(BridgeConfigError::BlankStageName(i + 1));
        }
        if !seen.insert(name.as_str()) {
            return Err(BridgeConfigError::DuplicateStage(name.clone()));
        }
    }

    Ok(())
}

// =============================================================================
// Run State Machine
// =============================================================================

/// Where the run is between two events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Nothing emitted yet
    Begin,
    /// `workflow_started` sent; tool lease not yet acquired
    Acquire,
    /// Next event announces the stage at this index (or finishes the run)
    Announce(usize),
    /// `agent_started` sent for this index; next event is its outcome
    Invoke(usize),
    /// Terminal event sent
    Done,
}

struct RunState {
    run: PipelineRun,
    phase: Phase,
    context: Vec<ContextTurn>,
    results: Vec<StageResult>,
    invoker: Arc<dyn StageInvoker>,
    connector: Option<Arc<dyn ToolConnector>>,
    tool_timeout: Duration,
    lease: Option<Box<dyn ToolSession>>,
    span: tracing::Span,
}

impl RunState {
    /// Produce the next event, or `None` once the terminal event was sent.
    ///
    /// The phase is parked at `Done` while awaiting, so a run dropped
    /// mid-stage is never resumed.
    async fn next_event(&mut self) -> Option<PipelineEvent> {
        loop {
            match std::mem::replace(&mut self.phase, Phase::Done) {
                Phase::Begin => {
                    self.run.start();
                    self.phase = Phase::Acquire;
                    self.span.in_scope(|| info!("Run started"));
                    return Some(PipelineEvent::RunStarted {
                        run_id: self.run.id(),
                    });
                }
                Phase::Acquire => {
                    if let Err(e) = self.acquire_tools().await {
                        return Some(self.fail(e));
                    }
                    self.phase = Phase::Announce(0);
                }
                Phase::Announce(index) => {
                    let Some(stage_name) = self.run.stage(index).map(str::to_string) else {
                        return Some(self.finish());
                    };
                    self.phase = Phase::Invoke(index);
                    self.span
                        .in_scope(|| info!("Stage started: {} (step {})", stage_name, index + 1));
                    return Some(PipelineEvent::StageStarted {
                        stage_name,
                        step: step_number(index),
                    });
                }
                Phase::Invoke(index) => {
                    return Some(match self.invoke_stage(index).await {
                        Ok(result) => self.record(index, result),
                        Err(e) => self.fail(e),
                    });
                }
                Phase::Done => return None,
            }
        }
    }

    async fn acquire_tools(&mut self) -> Result<(), StageInvocationError> {
        let Some(connector) = self.connector.clone() else {
            return Ok(());
        };

        let timeout = self.tool_timeout;
        let session = tokio::time::timeout(timeout, connector.connect())
            .instrument(self.span.clone())
            .await
            .map_err(|_| ToolError::Timeout(timeout))??;
        self.span
            .in_scope(|| debug!("Tool session acquired ({} tools)", session.tools().len()));
        self.lease = Some(session);
        Ok(())
    }

    async fn invoke_stage(&self, index: usize) -> Result<StageResult, StageInvocationError> {
        let stage_name = self.run.stage(index).unwrap_or_default();
        let step = step_number(index);
        let request = StageRequest {
            stage_name,
            step,
            context: &self.context,
            tools: self.lease.as_deref(),
        };

        let span = info_span!(parent: &self.span, "stage", stage = stage_name, step);
        self.invoker.invoke(request).instrument(span).await
    }

    fn record(&mut self, index: usize, result: StageResult) -> PipelineEvent {
        self.span.in_scope(|| {
            info!(
                "Stage completed: {} (step {}, output_len={}, {}ms)",
                result.stage_name,
                result.step,
                result.content.len(),
                result.elapsed_ms
            )
        });

        self.context
            .push(ContextTurn::stage(&result.stage_name, &result.content));
        self.run.advance();
        self.phase = Phase::Announce(index + 1);

        let event = PipelineEvent::StageCompleted {
            stage_name: result.stage_name.clone(),
            step: result.step,
            output: result.content.clone(),
        };
        self.results.push(result);
        event
    }

    fn finish(&mut self) -> PipelineEvent {
        let final_output = self
            .results
            .last()
            .map(|r| r.content.clone())
            .unwrap_or_default();

        self.run.complete();
        self.release();
        self.span
            .in_scope(|| info!("Run completed (output_len={})", final_output.len()));

        PipelineEvent::RunCompleted { final_output }
    }

    fn fail(&mut self, error: StageInvocationError) -> PipelineEvent {
        let message = error.to_string();

        self.run.fail();
        self.release();
        self.span.in_scope(|| error!("Run failed: {}", message));

        PipelineEvent::RunFailed { message }
    }

    fn release(&mut self) {
        self.phase = Phase::Done;
        if self.lease.take().is_some() {
            self.span.in_scope(|| debug!("Tool session released"));
        }
    }
}

impl Drop for RunState {
    fn drop(&mut self) {
        if self.run.status().is_terminal() {
            return;
        }

        let was = self.run.status();
        self.run.cancel();
        self.span.in_scope(|| {
            warn!(
                "Run abandoned while {} at stage {}/{}; cancelling",
                was,
                (self.run.current_stage() + 1).min(self.run.stages().len()),
                self.run.stages().len()
            )
        });
    }
}

fn step_number(index: usize) -> u32 {
    u32::try_from(index + 1).unwrap_or(u32::MAX)
}
