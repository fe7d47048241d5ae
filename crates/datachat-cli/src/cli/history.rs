//! `dchat history` and `dchat config`.

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use datachat_types::chat::{Message, MessageRole};

use super::render::{print_analysis, truncate};
use crate::state::AppState;

pub async fn history(
    state: &AppState,
    session_id: &str,
    show: Option<usize>,
    json: bool,
) -> Result<()> {
    let messages = state
        .service
        .history(session_id)
        .await
        .with_context(|| format!("failed to load messages of session '{session_id}'"))?;

    if let Some(position) = show {
        let message = position
            .checked_sub(1)
            .and_then(|idx| messages.get(idx))
            .with_context(|| {
                format!(
                    "session '{session_id}' has no message #{position} ({} stored)",
                    messages.len()
                )
            })?;
        state.service.activate(session_id);
        let analysis = state.service.show_analysis(message);
        return print_analysis(&analysis, json);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
        return Ok(());
    }

    if messages.is_empty() {
        println!();
        println!("  No messages in session '{session_id}'.");
        println!();
        return Ok(());
    }

    println!();
    println!("  Session {}", style(session_id).cyan());
    println!();
    println!("{}", message_table(&messages));
    println!();
    println!(
        "  {}",
        style("Use --show <#> to reopen a message's analysis.").dim()
    );
    println!();

    Ok(())
}

fn message_table(messages: &[Message]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("#").fg(Color::White),
            Cell::new("Role").fg(Color::White),
            Cell::new("Content").fg(Color::White),
            Cell::new("SQL").fg(Color::White),
            Cell::new("Rows").fg(Color::White),
            Cell::new("Time").fg(Color::White),
        ]);

    for (idx, message) in messages.iter().enumerate() {
        let role = match message.role {
            MessageRole::User => Cell::new(message.role).fg(Color::Cyan),
            MessageRole::Assistant => Cell::new(message.role).fg(Color::Green),
        };
        let rows = message
            .sql_result()
            .map(|result| result.row_count().to_string())
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(idx + 1),
            role,
            Cell::new(truncate(&message.content, 60)),
            Cell::new(truncate(message.sql.as_deref().unwrap_or_default(), 40)),
            Cell::new(rows),
            Cell::new(&message.created_at),
        ]);
    }

    table
}

/// Print the effective configuration.
pub fn show_config(state: &AppState, json: bool) -> Result<()> {
    let config = state.config();
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    println!();
    println!("  {} {}", style("Data dir:").bold(), state.data_dir.display());
    println!("  {} {}", style("Endpoint:").bold(), config.stream_url());
    println!(
        "  {} {}s (connect {}s)",
        style("Idle timeout:").bold(),
        config.idle_timeout_secs,
        config.connect_timeout_secs
    );
    println!(
        "  {} thinking={} rag={} engine={}",
        style("Defaults:").bold(),
        config.enable_thinking,
        config.enable_rag,
        config.rag_engine
    );
    println!();
    Ok(())
}
