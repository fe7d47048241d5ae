//! Progress notifications published while a turn streams.
//!
//! Every update is wrapped in a `TurnProgress` carrying the turn id and the
//! session the turn was started for, so observers can ignore turns for
//! sessions they are not showing.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::{ChartSpec, SqlResult};
use crate::chat::Message;

/// Indicator text published when a turn starts.
pub const INDICATOR_CONNECTING: &str = "connecting";
/// Indicator text published on `sql_executing`.
pub const INDICATOR_QUERYING: &str = "querying database";
/// Indicator text published on `rag_retrieval`.
pub const INDICATOR_SEARCHING: &str = "searching knowledge base";

/// Why a turn failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection, status, body or idle-timeout failure.
    Transport,
    /// The server sent an `error` event.
    Server,
}

/// A single observable step of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnUpdate {
    Started { question: String },

    /// Transient loading indicator. `None` clears it.
    Indicator { text: Option<String> },

    Thinking { content: String },

    /// Accumulated model reasoning so far.
    Reasoning { content: String },

    SchemaLoaded { tables: Vec<serde_json::Value> },

    SqlGenerated { sql: String },

    SqlResult { result: SqlResult },

    ChartReady {
        option: ChartSpec,
        chart_type: String,
    },

    Summary { content: String },

    /// The finalized answer was stored.
    MessageSaved { message: Message },

    TitleUpdated { title: String },

    Completed,

    Failed { message: String, kind: FailureKind },

    Cancelled,
}

impl TurnUpdate {
    /// Whether no further updates follow for this turn.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TurnUpdate::Completed | TurnUpdate::Failed { .. } | TurnUpdate::Cancelled
        )
    }
}

/// Envelope broadcast on the progress bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnProgress {
    pub turn_id: Uuid,
    pub session_id: String,
    pub update: TurnUpdate,
}

/// How a turn ended, returned to the caller of `ask`.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The stream finished. `message` is the stored answer, absent when no
    /// `summary` arrived or storing it failed.
    Completed { message: Option<Message> },
    Failed { message: String, kind: FailureKind },
    Cancelled,
}

impl TurnOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TurnOutcome::Completed { .. })
    }

    pub fn message(&self) -> Option<&Message> {
        match self {
            TurnOutcome::Completed { message } => message.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_updates() {
        assert!(TurnUpdate::Completed.is_terminal());
        assert!(TurnUpdate::Cancelled.is_terminal());
        assert!(
            TurnUpdate::Failed {
                message: "boom".to_string(),
                kind: FailureKind::Server
            }
            .is_terminal()
        );
        assert!(
            !TurnUpdate::Indicator {
                text: Some(INDICATOR_QUERYING.to_string())
            }
            .is_terminal()
        );
    }

    #[test]
    fn test_turn_update_serializes_with_type_tag() {
        let update = TurnUpdate::SqlGenerated {
            sql: "SELECT 1".to_string(),
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["type"], "sql_generated");
        assert_eq!(json["sql"], "SELECT 1");
    }

    #[test]
    fn test_outcome_message_accessor() {
        assert!(TurnOutcome::Cancelled.message().is_none());
        assert!(TurnOutcome::Completed { message: None }.is_completed());
        assert!(
            !TurnOutcome::Failed {
                message: "x".to_string(),
                kind: FailureKind::Transport
            }
            .is_completed()
        );
    }
}
