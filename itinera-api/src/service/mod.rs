//! Service Module
//!
//! Business logic layer for the API.
//! Services orchestrate between the conversation store and the pipeline.

pub mod conversation;
pub mod message;
pub mod session;

// Re-export for convenience
pub use conversation as conversation_service;
pub use message as message_service;
