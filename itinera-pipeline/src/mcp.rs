//! MCP tool server client (streamable HTTP transport)
//!
//! A session is opened with `initialize`, confirmed with
//! `notifications/initialized`, and identified afterwards by the session id
//! header the server hands out. The server may answer a request with plain
//! JSON or with a short event stream carrying the JSON-RPC response.

use async_trait::async_trait;
use itinera_core::dto::rpc::{RpcRequest, RpcResponse};
use itinera_core::dto::tool::{ToolCall, ToolCallResult, ToolList, ToolSpec};
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::tools::{ToolConnector, ToolSession};

pub const SESSION_HEADER: &str = "mcp-session-id";
pub const PROTOCOL_VERSION: &str = "2025-03-26";

const ACCEPT_JSON_OR_SSE: &str = "application/json, text/event-stream";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens one MCP session per run
#[derive(Debug, Clone)]
pub struct McpConnector {
    url: String,
    client: Client,
}

impl McpConnector {
    /// Connector whose requests each give up after `timeout`
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ToolError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build()?;
        Ok(Self::with_client(url, client))
    }

    pub fn with_client(url: impl Into<String>, client: Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ToolConnector for McpConnector {
    async fn connect(&self) -> Result<Box<dyn ToolSession>, ToolError> {
        let mut session = McpSession {
            url: self.url.clone(),
            client: self.client.clone(),
            session_id: None,
            tools: Vec::new(),
            next_id: AtomicU64::new(1),
        };

        let initialize = RpcRequest::call(
            session.next_id(),
            "initialize",
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {"name": "itinera", "version": env!("CARGO_PKG_VERSION")},
            }),
        );
        let response = session.post(&initialize).await?;
        session.session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let info = read_result(response).await?;
        debug!(
            "Connected to tool server {} (session {:?}, server {})",
            session.url,
            session.session_id,
            info["serverInfo"]["name"].as_str().unwrap_or("unknown")
        );

        session
            .post(&RpcRequest::notification("notifications/initialized"))
            .await?;

        let listed = session.call("tools/list", json!({})).await?;
        let list: ToolList = serde_json::from_value(listed)
            .map_err(|e| ToolError::Protocol(format!("invalid tools/list result: {e}")))?;
        session.tools = list.tools;

        Ok(Box::new(session))
    }
}

/// An open MCP session. Dropping it asks the server to end the session.
#[derive(Debug)]
pub struct McpSession {
    url: String,
    client: Client,
    session_id: Option<String>,
    tools: Vec<ToolSpec>,
    next_id: AtomicU64,
}

impl McpSession {
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn post(&self, rpc: &RpcRequest) -> Result<reqwest::Response, ToolError> {
        let mut request = self
            .client
            .post(&self.url)
            .header(ACCEPT, ACCEPT_JSON_OR_SSE)
            .json(rpc);
        if let Some(id) = &self.session_id {
            request = request.header(SESSION_HEADER, id);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ToolError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, ToolError> {
        let request = RpcRequest::call(self.next_id(), method, params);
        let response = self.post(&request).await?;
        read_result(response).await
    }
}

#[async_trait]
impl ToolSession for McpSession {
    fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, ToolError> {
        let params = serde_json::to_value(ToolCall {
            name: name.to_string(),
            arguments,
        })
        .map_err(|e| ToolError::Protocol(e.to_string()))?;

        let value = self.call("tools/call", params).await?;
        let result: ToolCallResult = serde_json::from_value(value)
            .map_err(|e| ToolError::Protocol(format!("invalid tools/call result: {e}")))?;

        if result.is_error {
            return Err(ToolError::ToolFailed {
                tool: name.to_string(),
                message: result.joined_text(),
            });
        }

        Ok(result.joined_text())
    }
}

impl Drop for McpSession {
    fn drop(&mut self) {
        let Some(session_id) = self.session_id.take() else {
            return;
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime available to close tool session {}", session_id);
            return;
        };

        let request = self
            .client
            .delete(&self.url)
            .header(SESSION_HEADER, session_id.as_str());
        runtime.spawn(async move {
            match request.send().await {
                Ok(response) => debug!(
                    "Closed tool session {} (status {})",
                    session_id,
                    response.status()
                ),
                Err(e) => warn!("Failed to close tool session {}: {}", session_id, e),
            }
        });
    }
}

async fn read_result(response: reqwest::Response) -> Result<Value, ToolError> {
    let is_event_stream = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/event-stream"));
    let body = response.text().await?;

    let rpc = parse_rpc_body(&body, is_event_stream)?;
    Ok(rpc.into_result()?)
}

/// Extract the JSON-RPC response from a plain JSON or event-stream body
fn parse_rpc_body(body: &str, is_event_stream: bool) -> Result<RpcResponse, ToolError> {
    if !is_event_stream {
        return serde_json::from_str(body)
            .map_err(|e| ToolError::Protocol(format!("invalid JSON-RPC response: {e}")));
    }

    let normalized = body.replace("\r\n", "\n");
    normalized
        .split("\n\n")
        .filter_map(|frame| {
            let data: Vec<&str> = frame
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(|d| d.strip_prefix(' ').unwrap_or(d))
                .collect();
            if data.is_empty() {
                return None;
            }
            serde_json::from_str::<RpcResponse>(&data.join("\n")).ok()
        })
        .next()
        .ok_or_else(|| ToolError::Protocol("event stream carried no JSON-RPC response".into()))
}
