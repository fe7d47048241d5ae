//! `dchat replay`: feed a recorded `text/event-stream` body through the
//! engine offline, with an in-memory message store.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, ensure};

use datachat_core::chat::service::ConversationService;
use datachat_core::stream::transport::ReplayTransport;
use datachat_infra::memory::InMemoryMessageStore;
use datachat_types::config::ClientConfig;

use super::ask::run_turn;
use super::render::{RenderMode, print_analysis, print_outcome};

pub async fn replay(
    file: &Path,
    chunk_size: usize,
    session_id: &str,
    json: bool,
    quiet: bool,
) -> Result<()> {
    ensure!(chunk_size > 0, "--chunk-size must be at least 1");

    let body = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    tracing::debug!(bytes = body.len(), chunk_size, "replaying recorded stream");

    let service = Arc::new(ConversationService::new(
        ReplayTransport::new(body, chunk_size),
        InMemoryMessageStore::new(),
        ClientConfig::default(),
    ));
    service.activate(session_id);

    let mode = RenderMode { json, quiet };
    let question = format!("replay of {}", file.display());
    let request = service.request(session_id, &question);
    let outcome = run_turn(Arc::clone(&service), request, mode).await;
    print_outcome(&outcome, mode)?;

    if !quiet {
        print_analysis(&service.analysis(), json)?;
    }
    Ok(())
}
