//! Conversation service driving streaming turns.
//!
//! `ConversationService` owns the analysis workspace, the progress bus and
//! the single-flight guard. `ask` runs one turn end to end: open the stream,
//! decode frames, apply them to the turn state machine, carry out its
//! effects, and report how the turn ended.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use datachat_types::analysis::AnalysisState;
use datachat_types::chat::{ChatRequest, Message};
use datachat_types::config::ClientConfig;
use datachat_types::error::RepositoryError;
use datachat_types::progress::{TurnOutcome, TurnProgress, TurnUpdate};

use crate::analysis::workspace::AnalysisWorkspace;
use crate::chat::flight::FlightGuard;
use crate::event::bus::ProgressBus;
use crate::repository::message::MessageStore;
use crate::stream::decoder::frame_stream;
use crate::stream::dispatch::classify;
use crate::stream::transport::{StreamTransport, with_idle_timeout};
use crate::turn::machine::{TurnEffect, TurnMachine};
use crate::turn::state::Turn;

/// Runs streaming turns and keeps per-session analysis state.
///
/// Generic over `StreamTransport` and `MessageStore` so datachat-core never
/// depends on datachat-infra.
pub struct ConversationService<T: StreamTransport, M: MessageStore> {
    transport: T,
    store: M,
    workspace: AnalysisWorkspace,
    bus: ProgressBus,
    flight: FlightGuard,
    config: ClientConfig,
}

impl<T: StreamTransport, M: MessageStore> ConversationService<T, M> {
    pub fn new(transport: T, store: M, config: ClientConfig) -> Self {
        Self {
            transport,
            store,
            workspace: AnalysisWorkspace::new(config.session_cache_capacity),
            bus: ProgressBus::new(config.progress_capacity),
            flight: FlightGuard::new(),
            config,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn store(&self) -> &M {
        &self.store
    }

    pub fn workspace(&self) -> &AnalysisWorkspace {
        &self.workspace
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Subscribe to progress of all future turns.
    pub fn subscribe(&self) -> broadcast::Receiver<TurnProgress> {
        self.bus.subscribe()
    }

    /// Build a request using the configured thinking/RAG defaults.
    pub fn request(&self, session_id: &str, question: &str) -> ChatRequest {
        ChatRequest {
            enable_thinking: self.config.enable_thinking,
            enable_rag: self.config.enable_rag,
            rag_engine: self.config.rag_engine,
            ..ChatRequest::new(session_id, question)
        }
    }

    // --- Turns ---

    /// Ask a question in `session_id` with the configured request flags.
    pub async fn ask(&self, session_id: &str, question: &str) -> TurnOutcome {
        self.ask_with(self.request(session_id, question)).await
    }

    /// Run one turn to completion.
    ///
    /// Any turn already in flight is cancelled first, and its stream is
    /// closed before this turn opens a new one. Cancellation of this turn, by
    /// `cancel` or by a newer turn, yields `TurnOutcome::Cancelled`.
    pub async fn ask_with(&self, request: ChatRequest) -> TurnOutcome {
        let turn_id = Uuid::now_v7();
        let ticket = self.flight.begin(turn_id).await;
        let token = ticket.token().clone();
        let session_id = request.session_id.clone();
        info!(%turn_id, %session_id, holds_slot = ticket.holds_slot(), "starting turn");

        let mut machine = TurnMachine::new(Turn::new(turn_id, &session_id, &request.question));
        let mut saved = None;

        let effects = machine.start();
        self.run_effects(turn_id, &session_id, effects, &mut saved).await;

        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            opened = self.transport.open(&request) => Some(opened),
        };

        match opened {
            None => {
                let effects = machine.cancel();
                self.run_effects(turn_id, &session_id, effects, &mut saved).await;
            }
            Some(Err(e)) => {
                let effects = machine.fail(e);
                self.run_effects(turn_id, &session_id, effects, &mut saved).await;
            }
            Some(Ok(body)) => {
                let mut frames = frame_stream(with_idle_timeout(body, self.idle_timeout()));
                while !machine.is_terminal() {
                    let effects = tokio::select! {
                        biased;
                        _ = token.cancelled() => machine.cancel(),
                        next = frames.next() => match next {
                            Some(Ok(frame)) => machine.apply(classify(&frame)),
                            Some(Err(e)) => machine.fail(e),
                            None => machine.finish(),
                        },
                    };
                    self.run_effects(turn_id, &session_id, effects, &mut saved).await;
                }
                // Dropping the frame stream aborts the request.
            }
        }

        self.flight.finish(turn_id);
        drop(ticket);
        let outcome = machine.outcome(saved);
        info!(%turn_id, %session_id, phase = ?machine.phase(), "turn ended");
        outcome
    }

    /// Cancel the in-flight turn. Returns `false` if none was running.
    pub fn cancel(&self) -> bool {
        self.flight.cancel()
    }

    /// Whether a turn is currently streaming.
    pub fn is_busy(&self) -> bool {
        self.flight.in_flight().is_some()
    }

    fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.config.idle_timeout_secs)
    }

    async fn run_effects(
        &self,
        turn_id: Uuid,
        session_id: &str,
        effects: Vec<TurnEffect>,
        saved: &mut Option<Message>,
    ) {
        for effect in effects {
            match effect {
                TurnEffect::Publish(update) => self.publish(turn_id, session_id, update),
                TurnEffect::Analysis(patch) => {
                    self.workspace.apply(session_id, &patch);
                }
                TurnEffect::Persist(new_message) => {
                    match self.store.create_message(&new_message).await {
                        Ok(message) => {
                            info!(%turn_id, %session_id, message_id = %message.id, "answer stored");
                            self.publish(
                                turn_id,
                                session_id,
                                TurnUpdate::MessageSaved {
                                    message: message.clone(),
                                },
                            );
                            *saved = Some(message);
                        }
                        Err(e) => {
                            warn!(%turn_id, %session_id, error = %e, "failed to store answer");
                        }
                    }
                }
            }
        }
    }

    fn publish(&self, turn_id: Uuid, session_id: &str, update: TurnUpdate) {
        self.bus.publish(turn_id, session_id, update);
    }

    // --- Sessions ---

    /// Switch the active session, returning its restored analysis state.
    pub fn activate(&self, session_id: &str) -> AnalysisState {
        self.workspace.activate(session_id)
    }

    /// Leave no session active, keeping the current one cached.
    pub fn deactivate(&self) {
        self.workspace.deactivate();
    }

    /// Forget a deleted session's cached analysis.
    pub fn remove_session(&self, session_id: &str) {
        info!(%session_id, "removing session analysis");
        self.workspace.clear(session_id);
    }

    /// Live analysis fields of the active session.
    pub fn analysis(&self) -> AnalysisState {
        self.workspace.snapshot()
    }

    /// Show a stored message's SQL, result and chart in the live fields.
    pub fn show_analysis(&self, message: &Message) -> AnalysisState {
        self.workspace.show_message(message)
    }

    /// Stored messages of a session, oldest first.
    pub async fn history(&self, session_id: &str) -> Result<Vec<Message>, RepositoryError> {
        self.store.list_messages(session_id).await
    }
}
