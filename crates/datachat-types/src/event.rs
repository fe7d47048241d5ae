//! Stream event types for datachat.
//!
//! `RawFrame` is what the frame decoder yields: the untyped `event:` and
//! `data:` fields of one blank-line-delimited record. `StreamEvent` is the
//! closed set of typed events the dispatcher produces from raw frames.

use serde::{Deserialize, Serialize};

use std::fmt;

use crate::analysis::{ChartSpec, SqlResult};

/// One decoded frame before classification.
///
/// At least one of the fields is present; frames with neither are dropped
/// by the decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFrame {
    /// Trimmed value of the `event:` line, if any.
    pub event: Option<String>,
    /// Trimmed value of the `data:` line, if any.
    pub data: Option<String>,
}

impl RawFrame {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: Some(event.into()),
            data: Some(data.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.event.is_none() && self.data.is_none()
    }
}

/// Event type tags understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Thinking,
    ModelThinking,
    RagRetrieval,
    SchemaLoaded,
    SqlGenerated,
    SqlExecuting,
    SqlResult,
    ChartReady,
    Summary,
    Done,
    Error,
}

impl EventKind {
    pub const ALL: [EventKind; 11] = [
        EventKind::Thinking,
        EventKind::ModelThinking,
        EventKind::RagRetrieval,
        EventKind::SchemaLoaded,
        EventKind::SqlGenerated,
        EventKind::SqlExecuting,
        EventKind::SqlResult,
        EventKind::ChartReady,
        EventKind::Summary,
        EventKind::Done,
        EventKind::Error,
    ];

    /// Wire tag for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Thinking => "thinking",
            EventKind::ModelThinking => "model_thinking",
            EventKind::RagRetrieval => "rag_retrieval",
            EventKind::SchemaLoaded => "schema_loaded",
            EventKind::SqlGenerated => "sql_generated",
            EventKind::SqlExecuting => "sql_executing",
            EventKind::SqlResult => "sql_result",
            EventKind::ChartReady => "chart_ready",
            EventKind::Summary => "summary",
            EventKind::Done => "done",
            EventKind::Error => "error",
        }
    }

    /// Look up a wire tag. Returns `None` for tags the engine does not know.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of the `done` event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DoneInfo {
    /// New session title chosen by the server, if any.
    pub session_title: Option<String>,
    /// The full payload, passed through for observers.
    pub payload: serde_json::Value,
}

/// A classified stream event with its parsed payload.
///
/// Payload fields that are missing or of the wrong type fall back to empty
/// values. A payload that is not JSON at all yields `Malformed` instead, so a
/// garbled frame never overwrites state.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Latest reasoning snippet. Replaces the previous one.
    Thinking { content: String },

    /// A chunk of streamed model reasoning. Appended.
    ModelThinking { content: String },

    /// Knowledge-base lookup progress.
    RagRetrieval { content: String },

    /// Schema introspection finished.
    SchemaLoaded { tables: Vec<serde_json::Value> },

    SqlGenerated { sql: String },

    /// The query is being executed.
    SqlExecuting { content: Option<String> },

    SqlResult(SqlResult),

    ChartReady {
        option: ChartSpec,
        chart_type: String,
    },

    /// The final answer. Finalizes the turn.
    Summary { content: String },

    Done(DoneInfo),

    /// Server-reported failure.
    Error { message: String },

    /// A tag the engine does not recognize, or a frame without a tag.
    Unknown { event_type: Option<String> },

    /// A frame whose payload failed to parse. Dropped by the turn.
    Malformed { event_type: Option<String> },
}

impl StreamEvent {
    pub fn kind(&self) -> Option<EventKind> {
        Some(match self {
            StreamEvent::Thinking { .. } => EventKind::Thinking,
            StreamEvent::ModelThinking { .. } => EventKind::ModelThinking,
            StreamEvent::RagRetrieval { .. } => EventKind::RagRetrieval,
            StreamEvent::SchemaLoaded { .. } => EventKind::SchemaLoaded,
            StreamEvent::SqlGenerated { .. } => EventKind::SqlGenerated,
            StreamEvent::SqlExecuting { .. } => EventKind::SqlExecuting,
            StreamEvent::SqlResult(_) => EventKind::SqlResult,
            StreamEvent::ChartReady { .. } => EventKind::ChartReady,
            StreamEvent::Summary { .. } => EventKind::Summary,
            StreamEvent::Done(_) => EventKind::Done,
            StreamEvent::Error { .. } => EventKind::Error,
            StreamEvent::Unknown { .. } | StreamEvent::Malformed { .. } => return None,
        })
    }

    /// Tag used in log fields.
    pub fn event_type(&self) -> &str {
        match self {
            StreamEvent::Unknown { event_type } | StreamEvent::Malformed { event_type } => {
                event_type.as_deref().unwrap_or("<untagged>")
            }
            other => other.kind().map(|k| k.as_str()).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_tags_roundtrip() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_tag(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::from_tag("heartbeat"), None);
        assert_eq!(EventKind::from_tag("Thinking"), None);
    }

    #[test]
    fn test_event_kind_serde_matches_wire_tag() {
        let json = serde_json::to_string(&EventKind::SqlGenerated).unwrap();
        assert_eq!(json, "\"sql_generated\"");
    }

    #[test]
    fn test_stream_event_type_labels() {
        assert_eq!(
            StreamEvent::Summary {
                content: "done".to_string()
            }
            .event_type(),
            "summary"
        );
        assert_eq!(
            StreamEvent::Unknown {
                event_type: Some("heartbeat".to_string())
            }
            .event_type(),
            "heartbeat"
        );
        assert_eq!(
            StreamEvent::Unknown { event_type: None }.event_type(),
            "<untagged>"
        );
    }

    #[test]
    fn test_malformed_event_has_no_kind() {
        let event = StreamEvent::Malformed {
            event_type: Some("summary".to_string()),
        };
        assert_eq!(event.kind(), None);
        assert_eq!(event.event_type(), "summary");
    }

    #[test]
    fn test_raw_frame_emptiness() {
        assert!(RawFrame::default().is_empty());
        assert!(!RawFrame::new("done", "{}").is_empty());
    }
}
