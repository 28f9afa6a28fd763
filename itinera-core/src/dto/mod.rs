//! Data Transfer Objects
//!
//! Request and response bodies exchanged between the API, the tool server
//! and their clients.

pub mod conversation;
pub mod health;
pub mod message;
pub mod rpc;
pub mod tool;
