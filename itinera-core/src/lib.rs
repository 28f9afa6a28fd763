//! Itinera Core
//!
//! Core types shared by the Itinera travel-planning services.
//!
//! This crate contains:
//! - Domain types: conversations, messages, pipeline runs and their events
//! - DTOs: request/response bodies exchanged between the API and its clients
//!
//! The [`domain::event`] module owns the event-stream wire contract, so the
//! server and every client encode and decode it the same way.

pub mod domain;
pub mod dto;
