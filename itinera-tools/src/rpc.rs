//! MCP endpoint
//!
//! JSON-RPC 2.0 over HTTP POST. `initialize` opens a session and returns
//! its id in the `Mcp-Session-Id` header; clients echo that header on later
//! requests and end the session with `DELETE /mcp`.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use itinera_core::dto::health::HealthStatus;
use itinera_core::dto::rpc::{INTERNAL_ERROR, PARSE_ERROR, RpcError, RpcRequest, RpcResponse};
use itinera_core::dto::tool::{ToolCall, ToolCallResult, ToolList};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::tools::{self, ToolCallError};

pub const SESSION_HEADER: &str = "mcp-session-id";
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// Sessions idle longer than this are dropped
pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(30 * 60);
/// Opening past this many evicts the least recently used session
pub const MAX_SESSIONS: usize = 1024;

/// Open MCP sessions, keyed by id with their last use
#[derive(Debug)]
pub struct Sessions {
    open: Mutex<HashMap<String, Instant>>,
    idle_ttl: Duration,
    max_open: usize,
}

impl Default for Sessions {
    fn default() -> Self {
        Self::with_limits(SESSION_IDLE_TTL, MAX_SESSIONS)
    }
}

impl Sessions {
    pub fn with_limits(idle_ttl: Duration, max_open: usize) -> Self {
        Self {
            open: Mutex::new(HashMap::new()),
            idle_ttl,
            max_open: max_open.max(1),
        }
    }

    fn open(&self) -> String {
        let id = Uuid::new_v4().simple().to_string();
        let now = Instant::now();
        let mut open = self.lock();
        self.prune(&mut open, now);

        while open.len() >= self.max_open {
            let Some(oldest) = open
                .iter()
                .min_by_key(|(_, last_used)| **last_used)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            open.remove(&oldest);
            tracing::debug!("Session evicted: {}", oldest);
        }

        open.insert(id.clone(), now);
        id
    }

    /// True if the session is live; a hit counts as use
    fn contains(&self, id: &str) -> bool {
        let now = Instant::now();
        let mut open = self.lock();
        self.prune(&mut open, now);
        match open.get_mut(id) {
            Some(last_used) => {
                *last_used = now;
                true
            }
            None => false,
        }
    }

    fn close(&self, id: &str) -> bool {
        self.lock().remove(id).is_some()
    }

    pub fn open_count(&self) -> usize {
        let mut open = self.lock();
        self.prune(&mut open, Instant::now());
        open.len()
    }

    fn prune(&self, open: &mut HashMap<String, Instant>, now: Instant) {
        let before = open.len();
        open.retain(|_, last_used| now.duration_since(*last_used) < self.idle_ttl);
        let expired = before - open.len();
        if expired > 0 {
            tracing::debug!("Expired {} idle session(s)", expired);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Instant>> {
        // A poisoned map is still a valid map
        self.open.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub fn create_router(sessions: Arc<Sessions>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/mcp", post(handle_rpc).delete(end_session))
        .with_state(sessions)
        .layer(TraceLayer::new_for_http())
}

/// GET /health
async fn health_check() -> Json<HealthStatus> {
    Json(HealthStatus::healthy("itinera-tools"))
}

/// POST /mcp
async fn handle_rpc(
    State(sessions): State<Arc<Sessions>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request: RpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            let error = RpcError::new(PARSE_ERROR, format!("Parse error: {e}"));
            return Json(RpcResponse::failure(Value::Null, error)).into_response();
        }
    };

    if let Some(session) = session_id(&headers)
        && !sessions.contains(session)
    {
        tracing::debug!("Request for unknown session {}", session);
        return (StatusCode::NOT_FOUND, "Unknown session").into_response();
    }

    if request.is_notification() {
        tracing::debug!("Notification: {}", request.method);
        return StatusCode::ACCEPTED.into_response();
    }

    let id = request.id.clone().unwrap_or(Value::Null);
    if request.method == "initialize" {
        let session = sessions.open();
        tracing::info!("Session opened: {} ({} open)", session, sessions.open_count());
        let response = RpcResponse::success(id, initialize_result());
        return ([(SESSION_HEADER, session)], Json(response)).into_response();
    }

    let response = match dispatch(&request.method, request.params) {
        Ok(result) => RpcResponse::success(id, result),
        Err(error) => RpcResponse::failure(id, error),
    };
    Json(response).into_response()
}

/// DELETE /mcp
async fn end_session(State(sessions): State<Arc<Sessions>>, headers: HeaderMap) -> StatusCode {
    let Some(session) = session_id(&headers) else {
        return StatusCode::BAD_REQUEST;
    };

    if sessions.close(session) {
        tracing::info!("Session closed: {}", session);
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

fn session_id(headers: &HeaderMap) -> Option<&str> {
    headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok())
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {"tools": {"listChanged": false}},
        "serverInfo": {"name": "TravelTools", "version": env!("CARGO_PKG_VERSION")},
        "instructions": "Travel-related tools for weather, time, and restaurant search.",
    })
}

fn dispatch(method: &str, params: Value) -> Result<Value, RpcError> {
    match method {
        "ping" => Ok(json!({})),
        "tools/list" => to_result(&ToolList {
            tools: tools::catalog(),
        }),
        "tools/call" => {
            let call: ToolCall = serde_json::from_value(params)
                .map_err(|e| RpcError::invalid_params(format!("Invalid tools/call params: {e}")))?;
            tracing::info!("Tool call: {} {}", call.name, call.arguments);

            let output = tools::call(&call.name, &call.arguments).map_err(|e| match e {
                ToolCallError::UnknownTool(_) | ToolCallError::MissingArgument(_) => {
                    RpcError::invalid_params(e.to_string())
                }
            })?;
            to_result(&ToolCallResult::text(output))
        }
        other => Err(RpcError::method_not_found(other)),
    }
}

fn to_result<T: serde::Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::new(INTERNAL_ERROR, e.to_string()))
}
