//! Turn state machine.
//!
//! `TurnMachine` applies classified events to a `Turn` in decode order and
//! returns the side effects the caller must carry out: progress updates,
//! writes into the live analysis fields, and the single persist request.
//! It performs no IO itself.

use datachat_types::analysis::{ChartSpec, SqlResult};
use datachat_types::chat::{Message, NewMessage};
use datachat_types::error::StreamError;
use datachat_types::event::StreamEvent;
use datachat_types::progress::{
    FailureKind, INDICATOR_CONNECTING, INDICATOR_QUERYING, INDICATOR_SEARCHING, TurnOutcome,
    TurnUpdate,
};

use super::state::{Turn, TurnPhase};

/// A write into the live analysis fields of the turn's session.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisPatch {
    /// Clear the live SQL when a new turn starts.
    ResetSql,
    Sql(String),
    Result(SqlResult),
    Chart {
        option: ChartSpec,
        chart_type: String,
    },
}

/// Side effect produced by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEffect {
    Publish(TurnUpdate),
    Analysis(AnalysisPatch),
    /// Store the finalized answer. Emitted at most once per turn.
    Persist(NewMessage),
}

#[derive(Debug)]
pub struct TurnMachine {
    turn: Turn,
    failure: Option<(String, FailureKind)>,
}

impl TurnMachine {
    pub fn new(turn: Turn) -> Self {
        Self {
            turn,
            failure: None,
        }
    }

    pub fn turn(&self) -> &Turn {
        &self.turn
    }

    pub fn phase(&self) -> TurnPhase {
        self.turn.phase
    }

    pub fn is_terminal(&self) -> bool {
        self.turn.phase.is_terminal()
    }

    /// Effects for a freshly started turn.
    pub fn start(&mut self) -> Vec<TurnEffect> {
        vec![
            TurnEffect::Publish(TurnUpdate::Started {
                question: self.turn.question.clone(),
            }),
            indicator(Some(INDICATOR_CONNECTING)),
            TurnEffect::Analysis(AnalysisPatch::ResetSql),
        ]
    }

    /// Apply one event.
    pub fn apply(&mut self, event: StreamEvent) -> Vec<TurnEffect> {
        if self.is_terminal() {
            tracing::debug!(
                turn_id = %self.turn.id,
                event_type = event.event_type(),
                phase = ?self.turn.phase,
                "dropping event for finished turn"
            );
            return Vec::new();
        }

        let turn = &mut self.turn;
        match event {
            StreamEvent::Thinking { content } => {
                turn.phase = TurnPhase::Thinking;
                turn.thinking = content.clone();
                vec![TurnEffect::Publish(TurnUpdate::Thinking { content })]
            }
            StreamEvent::ModelThinking { content } => {
                turn.phase = TurnPhase::Thinking;
                turn.reasoning.push_str(&content);
                vec![TurnEffect::Publish(TurnUpdate::Reasoning {
                    content: turn.reasoning.clone(),
                })]
            }
            StreamEvent::RagRetrieval { .. } => vec![indicator(Some(INDICATOR_SEARCHING))],
            StreamEvent::SchemaLoaded { tables } => {
                vec![TurnEffect::Publish(TurnUpdate::SchemaLoaded { tables })]
            }
            StreamEvent::SqlGenerated { sql } => {
                turn.phase = TurnPhase::SqlGenerated;
                turn.sql = sql.clone();
                vec![
                    TurnEffect::Analysis(AnalysisPatch::Sql(sql.clone())),
                    TurnEffect::Publish(TurnUpdate::SqlGenerated { sql }),
                ]
            }
            StreamEvent::SqlExecuting { .. } => {
                turn.phase = TurnPhase::Executing;
                vec![indicator(Some(INDICATOR_QUERYING))]
            }
            StreamEvent::SqlResult(result) => {
                turn.phase = TurnPhase::ResultReceived;
                turn.sql_result = Some(result.clone());
                vec![
                    TurnEffect::Analysis(AnalysisPatch::Result(result.clone())),
                    TurnEffect::Publish(TurnUpdate::SqlResult { result }),
                ]
            }
            StreamEvent::ChartReady { option, chart_type } => {
                turn.phase = TurnPhase::ChartReady;
                turn.chart_option = Some(option.clone());
                turn.chart_type = chart_type.clone();
                vec![
                    TurnEffect::Analysis(AnalysisPatch::Chart {
                        option: option.clone(),
                        chart_type: chart_type.clone(),
                    }),
                    TurnEffect::Publish(TurnUpdate::ChartReady { option, chart_type }),
                ]
            }
            StreamEvent::Summary { content } => {
                if !turn.mark_finalized() {
                    tracing::warn!(turn_id = %turn.id, "duplicate summary ignored");
                    return Vec::new();
                }
                turn.phase = TurnPhase::Summarized;
                turn.content = content.clone();
                vec![
                    indicator(None),
                    TurnEffect::Publish(TurnUpdate::Summary { content }),
                    TurnEffect::Persist(turn.to_new_message()),
                ]
            }
            StreamEvent::Done(info) => {
                turn.phase = TurnPhase::Done;
                let mut effects = vec![indicator(None)];
                if let Some(title) = info.session_title {
                    effects.push(TurnEffect::Publish(TurnUpdate::TitleUpdated { title }));
                }
                effects.push(TurnEffect::Publish(TurnUpdate::Completed));
                effects
            }
            StreamEvent::Error { message } => self.fail(StreamError::Server(message)),
            StreamEvent::Malformed { event_type } => {
                tracing::debug!(turn_id = %turn.id, ?event_type, "dropping malformed event");
                Vec::new()
            }
            StreamEvent::Unknown { .. } => Vec::new(),
        }
    }

    /// Abort the turn with an error. Nothing further is persisted.
    pub fn fail(&mut self, error: StreamError) -> Vec<TurnEffect> {
        if self.is_terminal() {
            return Vec::new();
        }
        let kind = if error.is_transport() {
            FailureKind::Transport
        } else {
            FailureKind::Server
        };
        tracing::warn!(
            turn_id = %self.turn.id,
            session_id = %self.turn.session_id,
            error = %error,
            "turn failed"
        );
        let message = error.user_message();
        self.turn.phase = TurnPhase::Error;
        self.failure = Some((message.clone(), kind));
        vec![
            indicator(None),
            TurnEffect::Publish(TurnUpdate::Failed { message, kind }),
        ]
    }

    /// Stop the turn without reporting an error.
    pub fn cancel(&mut self) -> Vec<TurnEffect> {
        if self.is_terminal() {
            return Vec::new();
        }
        tracing::debug!(turn_id = %self.turn.id, "turn cancelled");
        self.turn.phase = TurnPhase::Cancelled;
        vec![indicator(None), TurnEffect::Publish(TurnUpdate::Cancelled)]
    }

    /// The stream ended. A turn that saw no `done` completes here.
    pub fn finish(&mut self) -> Vec<TurnEffect> {
        if self.is_terminal() {
            return Vec::new();
        }
        tracing::debug!(turn_id = %self.turn.id, "stream ended without done event");
        self.turn.phase = TurnPhase::Done;
        vec![indicator(None), TurnEffect::Publish(TurnUpdate::Completed)]
    }

    /// Outcome of a finished turn. `saved` is the stored answer, if any.
    pub fn outcome(&self, saved: Option<Message>) -> TurnOutcome {
        match (&self.turn.phase, &self.failure) {
            (TurnPhase::Error, Some((message, kind))) => TurnOutcome::Failed {
                message: message.clone(),
                kind: *kind,
            },
            (TurnPhase::Cancelled, _) => TurnOutcome::Cancelled,
            _ => TurnOutcome::Completed { message: saved },
        }
    }
}

fn indicator(text: Option<&str>) -> TurnEffect {
    TurnEffect::Publish(TurnUpdate::Indicator {
        text: text.map(str::to_string),
    })
}
