//! Itinera Pipeline
//!
//! Turns a sequential multi-stage agent pipeline into an ordered stream of
//! [`PipelineEvent`](itinera_core::domain::event::PipelineEvent)s.
//!
//! Architecture:
//! - Bridge: drives the stages of one run and yields lifecycle events lazily
//! - Adapter: the only boundary to the agent backend; enforces timeouts and
//!   normalizes output into `StageResult`s
//! - Backend: the LLM runtime that actually answers a stage (Ollama)
//! - Tools: the external tool server a run leases for its whole duration

pub mod adapter;
pub mod bridge;
pub mod catalog;
pub mod error;
pub mod mcp;
pub mod ollama;
pub mod stage;
pub mod tools;

pub use adapter::{AgentBackend, StageAdapter};
pub use bridge::{EventStream, PipelineBridge};
pub use error::{BridgeConfigError, StageInvocationError, ToolError};
pub use stage::{StageDefinition, StageInvoker, StageRequest};
pub use tools::{ToolConnector, ToolSession, ToolSpec};
