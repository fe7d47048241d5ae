//! Per-session analysis state: the LRU cache and the live workspace.

pub mod cache;
pub mod workspace;
