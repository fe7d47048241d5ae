//! Streaming ingestion engine and port trait definitions for datachat.
//!
//! This crate turns a cancellable byte stream into typed events, drives them
//! through the per-turn state machine, and keeps the per-session analysis
//! cache. It defines the "ports" (`StreamTransport`, `MessageStore`) that the
//! infrastructure layer (datachat-infra) implements and never depends on any
//! specific HTTP client.

pub mod analysis;
pub mod chat;
pub mod event;
pub mod repository;
pub mod stream;
pub mod turn;
