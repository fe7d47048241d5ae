//! Shared domain types for datachat.
//!
//! This crate contains the data shapes that flow through the streaming
//! ingestion engine: wire events, analysis artifacts, chat messages,
//! progress notifications, configuration, and error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, thiserror.

pub mod analysis;
pub mod chat;
pub mod config;
pub mod error;
pub mod event;
pub mod progress;
