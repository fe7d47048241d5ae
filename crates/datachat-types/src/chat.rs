//! Chat request and message types for datachat.
//!
//! `ChatRequest` is the JSON body of one streaming turn. `Message` and
//! `NewMessage` mirror the message-store API: the engine builds a
//! `NewMessage` when a turn is finalized and receives a stored `Message`.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::analysis::{ChartSpec, SqlResult};

/// Author of a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A message as returned by the message store.
///
/// `chart_cfg` and `data` hold serialized JSON text (chart option and result
/// set respectively), which is how the store persists them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_cfg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

impl Message {
    /// Decode the stored chart option, if any.
    pub fn chart_option(&self) -> Option<ChartSpec> {
        decode_json_text(self.chart_cfg.as_deref())
    }

    /// Decode the stored result set, if any.
    pub fn sql_result(&self) -> Option<SqlResult> {
        decode_json_text(self.data.as_deref())
    }
}

fn decode_json_text<T: serde::de::DeserializeOwned>(text: Option<&str>) -> Option<T> {
    let text = text?.trim();
    if text.is_empty() {
        return None;
    }
    serde_json::from_str(text).ok()
}

/// Request body for `createMessage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_cfg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// Retrieval backend used when RAG is enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RagEngine {
    #[default]
    Light,
    Pro,
}

impl fmt::Display for RagEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RagEngine::Light => write!(f, "light"),
            RagEngine::Pro => write!(f, "pro"),
        }
    }
}

impl FromStr for RagEngine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "light" => Ok(RagEngine::Light),
            "pro" => Ok(RagEngine::Pro),
            other => Err(format!("invalid rag engine: '{other}'")),
        }
    }
}

/// JSON body POSTed to the streaming endpoint for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub question: String,
    #[serde(default)]
    pub enable_thinking: bool,
    #[serde(default)]
    pub enable_rag: bool,
    #[serde(default)]
    pub rag_engine: RagEngine,
}

impl ChatRequest {
    pub fn new(session_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            question: question.into(),
            enable_thinking: false,
            enable_rag: false,
            rag_engine: RagEngine::Light,
        }
    }
}
