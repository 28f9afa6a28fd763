//! API Module
//!
//! HTTP API layer. Each submodule handles endpoints for a specific domain.

pub mod conversation;
pub mod error;
pub mod health;
pub mod message;

use axum::{
    Router,
    http::HeaderValue,
    routing::{delete, get, post},
};
use itinera_pipeline::PipelineBridge;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::store::ConversationStore;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ConversationStore>,
    pub bridge: Arc<PipelineBridge>,
    pub config: Arc<Config>,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    let api = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Conversation endpoints
        .route("/conversations", post(conversation::create_conversation))
        .route("/conversations", get(conversation::list_conversations))
        .route("/conversations/{id}", get(conversation::get_conversation))
        .route(
            "/conversations/{id}",
            delete(conversation::delete_conversation),
        )
        // Message endpoint (starts a run and streams its events)
        .route("/conversations/{id}/messages", post(message::send_message));

    Router::new()
        .nest("/api", api)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::testing::{ScriptedInvoker, app_state};
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use itinera_core::domain::conversation::Conversation;
    use itinera_core::domain::event::PipelineEvent;
    use itinera_core::dto::conversation::{ConversationDetail, ConversationSummary};
    use serde::de::DeserializeOwned;
    use std::sync::atomic::Ordering;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn router(store: Arc<MemoryStore>, invoker: Arc<ScriptedInvoker>) -> Router {
        create_router(app_state(store, invoker))
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn read_json<T: DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Decode an SSE body into events, skipping comment-only blocks
    fn parse_sse(body: &str) -> Vec<PipelineEvent> {
        body.split("\n\n")
            .filter_map(|block| {
                let mut name = None;
                let mut data = None;
                for line in block.lines() {
                    if let Some(v) = line.strip_prefix("event:") {
                        name = Some(v.trim());
                    } else if let Some(v) = line.strip_prefix("data:") {
                        data = Some(v.trim());
                    }
                }
                Some(PipelineEvent::from_wire(name?, data?).unwrap())
            })
            .collect()
    }

    async fn create(app: &Router) -> Conversation {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/conversations",
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        read_json(response).await
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(Arc::default(), Arc::default());

        let response = app.oneshot(empty_request("GET", "/api/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = read_json(response).await;
        assert_eq!(
            body,
            serde_json::json!({"status": "healthy", "service": "itinera-api"})
        );
    }

    #[tokio::test]
    async fn test_conversation_crud() {
        let app = router(Arc::default(), Arc::default());

        let created = create(&app).await;
        assert_eq!(created.title, "New Conversation");

        let response = app
            .clone()
            .oneshot(empty_request("GET", "/api/conversations"))
            .await
            .unwrap();
        let list: Vec<ConversationSummary> = read_json(response).await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, created.id);
        assert_eq!(list[0].message_count, 0);

        let uri = format!("/api/conversations/{}", created.id);
        let response = app
            .clone()
            .oneshot(empty_request("GET", &uri))
            .await
            .unwrap();
        let detail: ConversationDetail = read_json(response).await;
        assert!(detail.messages.is_empty());

        let response = app
            .clone()
            .oneshot(empty_request("DELETE", &uri))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app.oneshot(empty_request("GET", &uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_rejects_long_title() {
        let app = router(Arc::default(), Arc::default());

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/conversations",
                serde_json::json!({"title": "x".repeat(300)}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = read_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("too long"));
    }

    #[tokio::test]
    async fn test_message_streams_events() {
        let store = Arc::new(MemoryStore::default());
        let app = router(store.clone(), Arc::default());
        let conversation = create(&app).await;

        let response = app
            .oneshot(json_request(
                "POST",
                &format!("/api/conversations/{}/messages", conversation.id),
                serde_json::json!({"content": "Plan a trip to Madrid"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        assert_eq!(response.headers()["x-accel-buffering"], "no");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let events = parse_sse(std::str::from_utf8(&bytes).unwrap());

        let names: Vec<_> = events.iter().map(PipelineEvent::name).collect();
        assert_eq!(
            names,
            vec![
                "workflow_started",
                "agent_started",
                "agent_completed",
                "agent_started",
                "agent_completed",
                "agent_started",
                "agent_completed",
                "workflow_completed",
            ]
        );
        assert_eq!(
            events[1],
            PipelineEvent::StageStarted {
                stage_name: "Researcher".to_string(),
                step: 1,
            }
        );
        assert_eq!(
            events[7],
            PipelineEvent::RunCompleted {
                final_output: "Planner output".to_string(),
            }
        );

        // User message plus one per stage
        assert_eq!(store.messages_of(conversation.id).len(), 4);
    }

    #[tokio::test]
    async fn test_message_stage_failure_ends_with_error() {
        let invoker = Arc::new(ScriptedInvoker::failing("WeatherAnalyst"));
        let app = router(Arc::default(), invoker);
        let conversation = create(&app).await;

        let response = app
            .oneshot(json_request(
                "POST",
                &format!("/api/conversations/{}/messages", conversation.id),
                serde_json::json!({"content": "Amsterdam in winter"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let events = parse_sse(std::str::from_utf8(&bytes).unwrap());

        assert_eq!(events.len(), 5);
        match events.last() {
            Some(PipelineEvent::RunFailed { message }) => {
                assert!(message.contains("WeatherAnalyst"));
                assert!(message.contains("timed out"));
            }
            other => panic!("unexpected terminal event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_message_to_missing_conversation() {
        let invoker = Arc::new(ScriptedInvoker::default());
        let app = router(Arc::default(), invoker.clone());

        let response = app
            .oneshot(json_request(
                "POST",
                &format!("/api/conversations/{}/messages", Uuid::new_v4()),
                serde_json::json!({"content": "Rome"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = read_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("not found"));
        assert_eq!(invoker.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_message_rejected() {
        let store = Arc::new(MemoryStore::default());
        let app = router(store.clone(), Arc::default());
        let conversation = create(&app).await;

        let response = app
            .oneshot(json_request(
                "POST",
                &format!("/api/conversations/{}/messages", conversation.id),
                serde_json::json!({"content": "   "}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(store.messages_of(conversation.id).is_empty());
    }
}
