//! Core domain types
//!
//! Structures shared between the API (which persists conversations and
//! streams runs), the pipeline crate (which executes runs) and clients
//! (which consume the event stream).

pub mod context;
pub mod conversation;
pub mod event;
pub mod message;
pub mod run;
