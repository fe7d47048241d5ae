//! Turn accumulator and lifecycle phases.

use uuid::Uuid;

use datachat_types::analysis::{ChartSpec, DEFAULT_CHART_TYPE, SqlResult};
use datachat_types::chat::{MessageRole, NewMessage};

/// Lifecycle phase of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    Thinking,
    SqlGenerated,
    Executing,
    ResultReceived,
    ChartReady,
    Summarized,
    Done,
    Error,
    Cancelled,
}

impl TurnPhase {
    /// Whether the turn accepts no further events.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnPhase::Done | TurnPhase::Error | TurnPhase::Cancelled)
    }
}

/// Accumulates one question/answer exchange.
///
/// Fields are filled as events arrive. The turn is persisted at most once,
/// tracked by `finalized`.
#[derive(Debug, Clone)]
pub struct Turn {
    pub id: Uuid,
    /// Session captured when the turn started.
    pub session_id: String,
    pub question: String,
    pub phase: TurnPhase,
    /// Latest reasoning snippet; replaced by each `thinking` event.
    pub thinking: String,
    /// Streamed model reasoning; appended by each `model_thinking` event.
    pub reasoning: String,
    pub sql: String,
    pub chart_option: Option<ChartSpec>,
    pub chart_type: String,
    pub sql_result: Option<SqlResult>,
    pub content: String,
    finalized: bool,
}

impl Turn {
    pub fn new(id: Uuid, session_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            id,
            session_id: session_id.into(),
            question: question.into(),
            phase: TurnPhase::Idle,
            thinking: String::new(),
            reasoning: String::new(),
            sql: String::new(),
            chart_option: None,
            chart_type: DEFAULT_CHART_TYPE.to_string(),
            sql_result: None,
            content: String::new(),
            finalized: false,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Mark the turn as persisted. Returns `false` if it already was.
    pub(crate) fn mark_finalized(&mut self) -> bool {
        !std::mem::replace(&mut self.finalized, true)
    }

    /// Reasoning stored with the answer: streamed model reasoning if any,
    /// otherwise the latest `thinking` snippet.
    pub fn persisted_thinking(&self) -> Option<String> {
        [&self.reasoning, &self.thinking]
            .into_iter()
            .find(|s| !s.is_empty())
            .cloned()
    }

    /// Build the assistant message for the message store.
    pub fn to_new_message(&self) -> NewMessage {
        NewMessage {
            session_id: self.session_id.clone(),
            role: MessageRole::Assistant,
            content: self.content.clone(),
            sql: Some(self.sql.clone()).filter(|s| !s.is_empty()),
            chart_cfg: self
                .chart_option
                .as_ref()
                .and_then(|option| serde_json::to_string(option).ok()),
            thinking: self.persisted_thinking(),
            data: self
                .sql_result
                .as_ref()
                .and_then(|result| serde_json::to_string(result).ok()),
        }
    }
}
