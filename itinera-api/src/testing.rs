//! Test doubles shared by the service and API tests

use async_trait::async_trait;
use itinera_core::domain::context::ContextTurn;
use itinera_core::domain::run::StageResult;
use itinera_pipeline::catalog;
use itinera_pipeline::{PipelineBridge, StageInvocationError, StageInvoker, StageRequest};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::api::AppState;
use crate::config::Config;
use crate::store::ConversationStore;

/// Answers every stage with "<stage> output", or fails one named stage
#[derive(Default)]
pub struct ScriptedInvoker {
    pub fail_stage: Option<String>,
    pub calls: AtomicUsize,
    pub seen_context: Mutex<Vec<Vec<String>>>,
}

impl ScriptedInvoker {
    pub fn failing(stage: &str) -> Self {
        Self {
            fail_stage: Some(stage.to_string()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl StageInvoker for ScriptedInvoker {
    async fn invoke(&self, request: StageRequest<'_>) -> Result<StageResult, StageInvocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_context
            .lock()
            .unwrap()
            .push(request.context.iter().map(ContextTurn::render).collect());

        if self.fail_stage.as_deref() == Some(request.stage_name) {
            return Err(StageInvocationError::Timeout {
                stage: request.stage_name.to_string(),
                timeout: Duration::from_secs(180),
            });
        }

        Ok(StageResult::completed(
            request.stage_name,
            request.step,
            format!("{} output", request.stage_name),
            Duration::from_millis(1),
        ))
    }
}

/// Bridge over the travel planner stages
pub fn travel_bridge(invoker: Arc<ScriptedInvoker>) -> PipelineBridge {
    let stages = catalog::travel_planner()
        .into_iter()
        .map(|stage| stage.name)
        .collect();
    PipelineBridge::new(stages, invoker).unwrap()
}

pub fn app_state(store: Arc<dyn ConversationStore>, invoker: Arc<ScriptedInvoker>) -> AppState {
    AppState {
        store,
        bridge: Arc::new(travel_bridge(invoker)),
        config: Arc::new(Config::default()),
    }
}
