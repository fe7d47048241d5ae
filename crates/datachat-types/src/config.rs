//! Client configuration types for datachat.
//!
//! `ClientConfig` represents `config.toml` in the data directory. Every field
//! has a default so a missing or partial file still yields a usable client.

use serde::{Deserialize, Serialize};

use crate::chat::RagEngine;
use crate::error::ConfigError;

/// Top-level configuration for the streaming client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API base URL, e.g. `http://127.0.0.1:8000/api`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the streaming endpoint, relative to `base_url`.
    #[serde(default = "default_stream_path")]
    pub stream_path: String,

    /// Seconds without a received chunk before the turn fails. 0 disables.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Seconds allowed for establishing the connection.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Maximum sessions kept in the analysis cache. 0 means unbounded.
    #[serde(default)]
    pub session_cache_capacity: usize,

    /// Capacity of the progress broadcast channel.
    #[serde(default = "default_progress_capacity")]
    pub progress_capacity: usize,

    /// Ask the server to stream model reasoning.
    #[serde(default)]
    pub enable_thinking: bool,

    /// Ask the server to consult the knowledge base.
    #[serde(default)]
    pub enable_rag: bool,

    #[serde(default)]
    pub rag_engine: RagEngine,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000/api".to_string()
}

fn default_stream_path() -> String {
    "/chat/stream".to_string()
}

fn default_idle_timeout_secs() -> u64 {
    120
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_progress_capacity() -> usize {
    256
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            stream_path: default_stream_path(),
            idle_timeout_secs: default_idle_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            session_cache_capacity: 0,
            progress_capacity: default_progress_capacity(),
            enable_thinking: false,
            enable_rag: false,
            rag_engine: RagEngine::Light,
        }
    }
}

impl ClientConfig {
    /// Full URL of the streaming endpoint.
    pub fn stream_url(&self) -> String {
        join_url(&self.base_url, &self.stream_path)
    }

    /// Reject values the client cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                field: "base_url",
                reason: format!("'{}' is not an http(s) URL", self.base_url),
            });
        }
        if self.progress_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "progress_capacity",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Join a base URL and a path with exactly one slash between them.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
