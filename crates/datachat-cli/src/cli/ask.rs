//! `dchat ask`: stream one turn against the backend.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_stream::wrappers::BroadcastStream;

use datachat_core::chat::service::ConversationService;
use datachat_core::repository::message::MessageStore;
use datachat_core::stream::transport::StreamTransport;
use datachat_types::chat::{ChatRequest, RagEngine};
use datachat_types::progress::TurnOutcome;

use super::render::{RenderMode, print_outcome, render_progress};
use crate::state::AppState;

/// How long the renderer may lag behind the finished turn.
const RENDER_GRACE: Duration = Duration::from_secs(2);

/// Per-turn flags layered over the configured defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct AskOptions {
    pub thinking: bool,
    pub rag: bool,
    pub rag_engine: Option<RagEngine>,
}

impl AskOptions {
    /// Apply the flags to a request. Choosing an engine implies `--rag`.
    pub fn apply(&self, request: &mut ChatRequest) {
        request.enable_thinking |= self.thinking;
        request.enable_rag |= self.rag || self.rag_engine.is_some();
        if let Some(engine) = self.rag_engine {
            request.rag_engine = engine;
        }
    }
}

pub async fn ask(
    state: &AppState,
    session_id: &str,
    question: &str,
    options: AskOptions,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let mode = RenderMode { json, quiet };
    let service = Arc::clone(&state.service);

    let mut request = service.request(session_id, question);
    options.apply(&mut request);
    service.activate(session_id);

    let outcome = run_turn(service, request, mode).await;
    print_outcome(&outcome, mode)
}

/// Run one turn while rendering its progress. Ctrl+C cancels the turn.
pub async fn run_turn<T, M>(
    service: Arc<ConversationService<T, M>>,
    request: ChatRequest,
    mode: RenderMode,
) -> TurnOutcome
where
    T: StreamTransport + Send + Sync + 'static,
    M: MessageStore + Send + Sync + 'static,
{
    let renderer = tokio::spawn(render_progress(
        BroadcastStream::new(service.subscribe()),
        mode,
    ));

    let canceller = {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() && service.cancel() {
                tracing::info!("turn cancelled by user");
            }
        })
    };

    let outcome = service.ask_with(request).await;
    canceller.abort();

    match tokio::time::timeout(RENDER_GRACE, renderer).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "progress renderer failed"),
        Err(_) => tracing::warn!("progress renderer did not see the end of the turn"),
    }

    outcome
}
