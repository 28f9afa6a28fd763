//! Stage invocation adapter
//!
//! The boundary between the bridge and whatever agent backend answers a
//! stage. It enforces the per-stage timeout, flattens backend errors into
//! [`StageInvocationError`] and refuses empty output.

use async_trait::async_trait;
use itinera_core::domain::context::ContextTurn;
use itinera_core::domain::run::StageResult;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::StageInvocationError;
use crate::stage::{StageDefinition, StageInvoker, StageRequest};
use crate::tools::ToolSession;

/// The external agent engine.
///
/// Errors are opaque to the pipeline; the adapter only reports their text.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    async fn complete(
        &self,
        stage: &StageDefinition,
        context: &[ContextTurn],
        tools: Option<&dyn ToolSession>,
    ) -> anyhow::Result<String>;
}

/// Adapts an [`AgentBackend`] to the bridge's [`StageInvoker`] contract
pub struct StageAdapter<B> {
    backend: B,
    stages: Vec<StageDefinition>,
    timeout: Duration,
}

impl<B: AgentBackend> StageAdapter<B> {
    pub fn new(backend: B, stages: Vec<StageDefinition>, timeout: Duration) -> Self {
        Self {
            backend,
            stages,
            timeout,
        }
    }

    /// Stage names in configured order
    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name.clone()).collect()
    }

    fn definition(&self, name: &str) -> Option<&StageDefinition> {
        self.stages.iter().find(|s| s.name == name)
    }
}

#[async_trait]
impl<B: AgentBackend> StageInvoker for StageAdapter<B> {
    async fn invoke(&self, request: StageRequest<'_>) -> Result<StageResult, StageInvocationError> {
        let stage = request.stage_name.to_string();
        let definition =
            self.definition(request.stage_name)
                .ok_or_else(|| StageInvocationError::UnknownStage {
                    stage: stage.clone(),
                })?;

        // Tools are only handed to stages that declare them
        let tools = if definition.uses_tools {
            request.tools
        } else {
            None
        };

        let started = Instant::now();
        let call = self.backend.complete(definition, request.context, tools);
        let raw = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                return Err(StageInvocationError::Failed {
                    stage,
                    message: format!("{e:#}"),
                });
            }
            Err(_) => {
                return Err(StageInvocationError::Timeout {
                    stage,
                    timeout: self.timeout,
                });
            }
        };

        let content = normalize_output(&raw);
        debug!(
            "Stage '{}' returned {} chars ({} after cleanup)",
            stage,
            raw.len(),
            content.len()
        );

        if content.is_empty() {
            return Err(StageInvocationError::EmptyOutput { stage });
        }

        Ok(StageResult::completed(
            stage,
            request.step,
            content,
            started.elapsed(),
        ))
    }
}

/// Trim backend output; trivial output (a lone character or punctuation)
/// counts as empty.
pub fn normalize_output(raw: &str) -> String {
    const TRIVIAL: [&str; 5] = ["-", ".", "...", "—", "–"];

    let text = raw.trim();
    if text.chars().count() <= 1 || TRIVIAL.contains(&text) {
        return String::new();
    }
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedBackend {
        reply: anyhow::Result<String>,
        delay: Duration,
        saw_tools: Mutex<Vec<bool>>,
    }

    impl ScriptedBackend {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                delay: Duration::ZERO,
                saw_tools: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AgentBackend for ScriptedBackend {
        async fn complete(
            &self,
            _stage: &StageDefinition,
            _context: &[ContextTurn],
            tools: Option<&dyn ToolSession>,
        ) -> anyhow::Result<String> {
            self.saw_tools.lock().unwrap().push(tools.is_some());
            tokio::time::sleep(self.delay).await;
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(anyhow::anyhow!("{e}")),
            }
        }
    }

    struct NoTools;

    #[async_trait]
    impl ToolSession for NoTools {
        fn tools(&self) -> &[crate::tools::ToolSpec] {
            &[]
        }

        async fn call_tool(
            &self,
            name: &str,
            _arguments: serde_json::Value,
        ) -> Result<String, crate::error::ToolError> {
            Ok(name.to_string())
        }
    }

    fn adapter(backend: ScriptedBackend) -> StageAdapter<ScriptedBackend> {
        StageAdapter::new(
            backend,
            vec![
                StageDefinition::new("Researcher", "research"),
                StageDefinition::new("WeatherAnalyst", "weather").with_tools(),
            ],
            Duration::from_millis(50),
        )
    }

    fn request<'a>(stage: &'a str, context: &'a [ContextTurn]) -> StageRequest<'a> {
        StageRequest {
            stage_name: stage,
            step: 1,
            context,
            tools: None,
        }
    }

    #[tokio::test]
    async fn test_successful_invocation_is_trimmed() {
        let adapter = adapter(ScriptedBackend::replying("  Key sights: Alfama  \n"));
        let context = vec![ContextTurn::user("Lisbon")];

        let result = adapter.invoke(request("Researcher", &context)).await.unwrap();
        assert_eq!(result.stage_name, "Researcher");
        assert_eq!(result.step, 1);
        assert_eq!(result.content, "Key sights: Alfama");
    }

    #[tokio::test]
    async fn test_empty_output_is_an_error() {
        let adapter = adapter(ScriptedBackend::replying("   ..."));
        let result = adapter.invoke(request("Researcher", &[])).await;
        assert!(matches!(
            result,
            Err(StageInvocationError::EmptyOutput { .. })
        ));
    }

    #[tokio::test]
    async fn test_backend_error_is_flattened() {
        let mut backend = ScriptedBackend::replying("");
        backend.reply = Err(anyhow::anyhow!("connection refused"));
        let adapter = adapter(backend);

        match adapter.invoke(request("Researcher", &[])).await {
            Err(StageInvocationError::Failed { stage, message }) => {
                assert_eq!(stage, "Researcher");
                assert!(message.contains("connection refused"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_hanging_backend_times_out() {
        let mut backend = ScriptedBackend::replying("late");
        backend.delay = Duration::from_secs(5);
        let adapter = adapter(backend);

        let result = adapter.invoke(request("Researcher", &[])).await;
        assert!(matches!(result, Err(StageInvocationError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_unknown_stage() {
        let adapter = adapter(ScriptedBackend::replying("text"));
        let result = adapter.invoke(request("Planner", &[])).await;
        assert!(matches!(
            result,
            Err(StageInvocationError::UnknownStage { .. })
        ));
    }

    #[tokio::test]
    async fn test_tools_only_reach_tool_stages() {
        let adapter = adapter(ScriptedBackend::replying("ok output"));
        let session = NoTools;

        for stage in ["Researcher", "WeatherAnalyst"] {
            let req = StageRequest {
                stage_name: stage,
                step: 1,
                context: &[],
                tools: Some(&session),
            };
            adapter.invoke(req).await.unwrap();
        }

        assert_eq!(*adapter.backend.saw_tools.lock().unwrap(), vec![false, true]);
    }

    #[test]
    fn test_normalize_output() {
        assert_eq!(normalize_output("  -  "), "");
        assert_eq!(normalize_output("x"), "");
        assert_eq!(normalize_output("—"), "");
        assert_eq!(normalize_output(" Pack an umbrella. "), "Pack an umbrella.");
    }
}
