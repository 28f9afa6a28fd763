//! Tool leases
//!
//! A run acquires one [`ToolSession`] before its first stage and holds it
//! until the run ends. The session is released when it is dropped, so
//! every exit path (completion, failure, or the consumer abandoning the
//! stream) gives the connection back.

use async_trait::async_trait;

pub use itinera_core::dto::tool::ToolSpec;

use crate::error::ToolError;

/// An open connection to a tool server. Dropping it releases the connection.
#[async_trait]
pub trait ToolSession: Send + Sync {
    /// Tools available for this session
    fn tools(&self) -> &[ToolSpec];

    /// Call a tool and return its text result
    async fn call_tool(&self, name: &str, arguments: serde_json::Value)
    -> Result<String, ToolError>;
}

/// Opens tool sessions
#[async_trait]
pub trait ToolConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn ToolSession>, ToolError>;
}
