//! Conversation orchestration: the single-flight guard and the service that
//! runs streaming turns.

pub mod flight;
pub mod service;
