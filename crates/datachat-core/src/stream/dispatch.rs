//! Classify raw frames into typed `StreamEvent`s.
//!
//! Classification never fails. A payload that is not valid JSON becomes
//! `StreamEvent::Malformed`, missing fields fall back to empty values, and
//! unrecognized tags become `StreamEvent::Unknown`.

use serde_json::{Map, Value};

use datachat_types::analysis::{DEFAULT_CHART_TYPE, SqlResult};
use datachat_types::event::{DoneInfo, EventKind, RawFrame, StreamEvent};

/// Message used when an `error` event carries no text.
pub const DEFAULT_ERROR_MESSAGE: &str = "an error occurred";

/// Classify one frame.
///
/// Frames without an `event:` line are accepted in envelope form, where the
/// payload is `{"event": "<type>", "data": {...}}`.
pub fn classify(frame: &RawFrame) -> StreamEvent {
    let Some(payload) = parse_payload(frame.event.as_deref(), frame.data.as_deref()) else {
        return StreamEvent::Malformed {
            event_type: frame.event.clone(),
        };
    };

    let (tag, payload) = match frame.event.as_deref() {
        Some(tag) => (Some(tag.to_string()), payload),
        None => unwrap_envelope(payload),
    };

    match tag.as_deref().and_then(EventKind::from_tag) {
        Some(kind) => build(kind, payload),
        None => {
            tracing::debug!(event_type = ?tag, "ignoring unrecognized event");
            StreamEvent::Unknown { event_type: tag }
        }
    }
}

/// Parse a payload. Absent or blank data is `{}`; malformed JSON is `None`.
pub fn parse_payload(event_type: Option<&str>, data: Option<&str>) -> Option<Value> {
    let Some(data) = data.map(str::trim).filter(|d| !d.is_empty()) else {
        return Some(empty_object());
    };
    match serde_json::from_str(data) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(
                event_type = event_type.unwrap_or("<untagged>"),
                error = %e,
                "malformed event payload, dropping frame"
            );
            None
        }
    }
}

fn unwrap_envelope(payload: Value) -> (Option<String>, Value) {
    let Value::Object(mut envelope) = payload else {
        return (None, payload);
    };
    let Some(Value::String(tag)) = envelope.remove("event") else {
        return (None, Value::Object(envelope));
    };
    let data = match envelope.remove("data") {
        None | Some(Value::Null) => empty_object(),
        Some(data) => data,
    };
    (Some(tag), data)
}

fn build(kind: EventKind, payload: Value) -> StreamEvent {
    match kind {
        EventKind::Thinking => StreamEvent::Thinking {
            content: str_field(&payload, "content"),
        },
        EventKind::ModelThinking => StreamEvent::ModelThinking {
            content: str_field(&payload, "content"),
        },
        EventKind::RagRetrieval => StreamEvent::RagRetrieval {
            content: str_field(&payload, "content"),
        },
        EventKind::SchemaLoaded => StreamEvent::SchemaLoaded {
            tables: payload
                .get("tables")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
        },
        EventKind::SqlGenerated => StreamEvent::SqlGenerated {
            sql: str_field(&payload, "sql"),
        },
        EventKind::SqlExecuting => StreamEvent::SqlExecuting {
            content: opt_str_field(&payload, "content"),
        },
        EventKind::SqlResult => StreamEvent::SqlResult(sql_result(payload)),
        EventKind::ChartReady => StreamEvent::ChartReady {
            option: payload.get("option").cloned().unwrap_or(Value::Null),
            chart_type: opt_str_field(&payload, "chart_type")
                .unwrap_or_else(|| DEFAULT_CHART_TYPE.to_string()),
        },
        EventKind::Summary => StreamEvent::Summary {
            content: str_field(&payload, "content"),
        },
        EventKind::Done => StreamEvent::Done(DoneInfo {
            session_title: opt_str_field(&payload, "session_title"),
            payload,
        }),
        EventKind::Error => StreamEvent::Error {
            message: opt_str_field(&payload, "message")
                .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string()),
        },
    }
}

fn sql_result(payload: Value) -> SqlResult {
    let columns = payload
        .get("columns")
        .and_then(Value::as_array)
        .map(|cols| {
            cols.iter()
                .map(|c| match c {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default();
    let rows = payload
        .get("rows")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    SqlResult { columns, rows }
}

fn str_field(payload: &Value, key: &str) -> String {
    payload
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Non-empty string field, if present.
fn opt_str_field(payload: &Value, key: &str) -> Option<String> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}
