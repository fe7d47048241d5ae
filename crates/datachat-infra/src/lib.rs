//! Infrastructure implementations for datachat.
//!
//! Provides the reqwest-backed streaming transport and message store, an
//! in-memory message store for offline use and tests, and configuration
//! loading. Implements the port traits defined in datachat-core.

pub mod config;
pub mod http;
pub mod memory;
