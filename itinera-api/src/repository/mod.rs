//! Repository Module
//!
//! Data access layer for the API.
//! Each repository handles database operations for a specific domain entity.

pub mod conversation;
pub mod message;

// Re-export for convenience
pub use conversation as conversation_repository;
pub use message as message_repository;
