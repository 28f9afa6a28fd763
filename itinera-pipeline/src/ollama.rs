//! Ollama chat backend
//!
//! Answers a stage with one `/api/chat` exchange, plus bounded rounds of
//! tool calls when the stage has tools and the model asks for them.

use anyhow::{Context, bail};
use async_trait::async_trait;
use itinera_core::domain::context::ContextTurn;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::adapter::AgentBackend;
use crate::stage::StageDefinition;
use crate::tools::{ToolSession, ToolSpec};

#[derive(Debug, Clone)]
pub struct OllamaBackend {
    host: String,
    model: String,
    max_tool_rounds: usize,
    client: Client,
}

impl OllamaBackend {
    pub fn new(host: impl Into<String>, model: impl Into<String>, max_tool_rounds: usize) -> Self {
        Self::with_client(host, model, max_tool_rounds, Client::new())
    }

    pub fn with_client(
        host: impl Into<String>,
        model: impl Into<String>,
        max_tool_rounds: usize,
        client: Client,
    ) -> Self {
        let host = host.into();
        Self {
            host: host.trim_end_matches('/').to_string(),
            model: model.into(),
            max_tool_rounds,
            client,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> anyhow::Result<ChatMessage> {
        let url = format!("{}/api/chat", self.host);
        let request = ChatRequest {
            model: &self.model,
            messages,
            tools: (!tools.is_empty()).then_some(tools),
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("failed to reach Ollama at {}", self.host))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            bail!("Ollama returned {}: {}", status, message.trim());
        }

        let reply: ChatResponse = response
            .json()
            .await
            .context("invalid chat response from Ollama")?;
        Ok(reply.message)
    }
}

#[async_trait]
impl AgentBackend for OllamaBackend {
    async fn complete(
        &self,
        stage: &StageDefinition,
        context: &[ContextTurn],
        tools: Option<&dyn ToolSession>,
    ) -> anyhow::Result<String> {
        let mut messages = render_messages(stage, context);
        let definitions = tools
            .map(|session| tool_definitions(session.tools()))
            .unwrap_or_default();

        let mut round = 0;
        loop {
            let offer_tools = !definitions.is_empty() && round < self.max_tool_rounds;
            let offered: &[ToolDefinition] = if offer_tools { &definitions } else { &[] };
            let reply = self.chat(&messages, offered).await?;

            let session = match tools {
                Some(session) if offer_tools && !reply.tool_calls.is_empty() => session,
                _ => return Ok(reply.content),
            };

            round += 1;
            debug!(
                "{} requested {} tool call(s) (round {}/{})",
                stage.name,
                reply.tool_calls.len(),
                round,
                self.max_tool_rounds
            );

            let calls = reply.tool_calls.clone();
            messages.push(reply);
            for call in calls {
                let name = call.function.name;
                let output = match session.call_tool(&name, call.function.arguments).await {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Tool {} failed for {}: {}", name, stage.name, e);
                        format!("Tool {name} failed: {e}")
                    }
                };
                messages.push(ChatMessage::tool(name, output));
            }
        }
    }
}

/// System instructions first, then the run context in order.
///
/// Stage turns go in as assistant messages tagged with the stage name so
/// later stages can tell who said what.
fn render_messages(stage: &StageDefinition, context: &[ContextTurn]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(context.len() + 1);
    messages.push(ChatMessage::new("system", stage.instructions.clone()));

    for turn in context {
        match turn {
            ContextTurn::User { content } => {
                messages.push(ChatMessage::new("user", content.clone()))
            }
            ContextTurn::Stage { .. } => {
                messages.push(ChatMessage::new("assistant", turn.render()))
            }
        }
    }

    messages
}

fn tool_definitions(specs: &[ToolSpec]) -> Vec<ToolDefinition> {
    specs
        .iter()
        .map(|spec| ToolDefinition {
            kind: "function",
            function: FunctionDefinition {
                name: spec.name.clone(),
                description: spec.description.clone(),
                parameters: spec.input_schema.clone(),
            },
        })
        .collect()
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
    stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ToolCallRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

impl ChatMessage {
    fn new(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content,
            tool_calls: Vec::new(),
            tool_name: None,
        }
    }

    fn tool(name: String, content: String) -> Self {
        Self {
            tool_name: Some(name),
            ..Self::new("tool", content)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ToolCallRequest {
    function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Serialize)]
struct ToolDefinition {
    #[serde(rename = "type")]
    kind: &'static str,
    function: FunctionDefinition,
}

#[derive(Debug, Serialize)]
struct FunctionDefinition {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_messages() {
        let stage = StageDefinition::new("Planner", "Plan the trip.");
        let context = vec![
            ContextTurn::user("3 days in Rome"),
            ContextTurn::stage("Researcher", "Colosseum, Vatican"),
        ];

        let messages = render_messages(&stage, &context);
        let shape: Vec<_> = messages
            .iter()
            .map(|m| (m.role.as_str(), m.content.as_str()))
            .collect();
        assert_eq!(
            shape,
            vec![
                ("system", "Plan the trip."),
                ("user", "3 days in Rome"),
                ("assistant", "[Researcher]: Colosseum, Vatican"),
            ]
        );
    }

    #[test]
    fn test_request_omits_empty_tools() {
        let messages = vec![ChatMessage::new("user", "hi".to_string())];
        let request = ChatRequest {
            model: "phi4-mini",
            messages: &messages,
            tools: None,
            stream: false,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("tools").is_none());
        assert_eq!(value["stream"], json!(false));
        assert_eq!(value["messages"][0], json!({"role": "user", "content": "hi"}));
    }

    #[test]
    fn test_tool_definitions_use_input_schema() {
        let specs = vec![ToolSpec {
            name: "get_weather".to_string(),
            description: "Current weather".to_string(),
            input_schema: json!({"type": "object", "properties": {"location": {"type": "string"}}}),
        }];

        let value = serde_json::to_value(tool_definitions(&specs)).unwrap();
        assert_eq!(value[0]["type"], "function");
        assert_eq!(value[0]["function"]["name"], "get_weather");
        assert_eq!(
            value[0]["function"]["parameters"]["properties"]["location"]["type"],
            "string"
        );
    }

    #[test]
    fn test_parse_tool_call_reply() {
        let reply: ChatResponse = serde_json::from_value(json!({
            "model": "phi4-mini",
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [{"function": {"name": "get_weather", "arguments": {"location": "Madrid"}}}]
            },
            "done": true
        }))
        .unwrap();

        assert_eq!(reply.message.tool_calls.len(), 1);
        assert_eq!(reply.message.tool_calls[0].function.name, "get_weather");
        assert_eq!(
            reply.message.tool_calls[0].function.arguments["location"],
            "Madrid"
        );
    }

    #[test]
    fn test_tool_message_carries_name() {
        let value =
            serde_json::to_value(ChatMessage::tool("get_weather".into(), "Sunny".into())).unwrap();
        assert_eq!(
            value,
            json!({"role": "tool", "content": "Sunny", "tool_name": "get_weather"})
        );
    }

    #[test]
    fn test_host_trailing_slash_trimmed() {
        let backend = OllamaBackend::new("http://localhost:11434/", "phi4-mini", 5);
        assert_eq!(backend.host, "http://localhost:11434");
        assert_eq!(backend.model(), "phi4-mini");
    }
}
