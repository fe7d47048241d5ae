//! Terminal rendering of turn progress, result tables and outcomes.
//!
//! Progress arrives on the service's broadcast bus; [`render_progress`]
//! drains it until the turn's terminal update. Text mode drives a spinner
//! for indicators and prints the SQL, result table and summary as they
//! land. JSON mode prints one `TurnProgress` object per line.

use std::time::Duration;

use anyhow::{Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use datachat_types::analysis::{AnalysisState, SqlResult};
use datachat_types::progress::{TurnOutcome, TurnProgress, TurnUpdate};

/// Rows shown in a result table before the rest is elided.
pub const MAX_TABLE_ROWS: usize = 20;

/// Output options shared by the streaming commands.
#[derive(Debug, Clone, Copy)]
pub struct RenderMode {
    pub json: bool,
    pub quiet: bool,
}

/// Print progress until a terminal update arrives or the bus closes.
pub async fn render_progress(mut updates: BroadcastStream<TurnProgress>, mode: RenderMode) {
    let mut printer = ProgressPrinter::new(mode);

    while let Some(item) = updates.next().await {
        let progress = match item {
            Ok(progress) => progress,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "progress renderer lagged behind");
                continue;
            }
        };

        if mode.json {
            match serde_json::to_string(&progress) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "failed to serialize progress"),
            }
        } else {
            printer.update(&progress.update);
        }

        if progress.update.is_terminal() {
            break;
        }
    }

    printer.finish();
}

/// Spinner plus the lines printed above it.
struct ProgressPrinter {
    spinner: ProgressBar,
    quiet: bool,
    summary: Option<String>,
}

impl ProgressPrinter {
    fn new(mode: RenderMode) -> Self {
        let spinner = if mode.json || mode.quiet {
            ProgressBar::hidden()
        } else {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.cyan} {msg}")
                    .unwrap(),
            );
            spinner.enable_steady_tick(Duration::from_millis(80));
            spinner
        };
        Self {
            spinner,
            quiet: mode.quiet,
            summary: None,
        }
    }

    /// Print above the spinner. Works when stderr is not a terminal too.
    fn line(&self, text: impl std::fmt::Display) {
        if !self.quiet {
            self.spinner.suspend(|| println!("{text}"));
        }
    }

    fn update(&mut self, update: &TurnUpdate) {
        match update {
            TurnUpdate::Started { question } => {
                self.line(format!("  {} {}", style("?").cyan().bold(), question));
            }
            TurnUpdate::Indicator { text } => {
                self.spinner.set_message(text.clone().unwrap_or_default());
            }
            TurnUpdate::Thinking { content } => {
                self.line(format!("  {}", style(truncate(content, 100)).dim()));
            }
            TurnUpdate::Reasoning { content } => {
                let last_line = content.lines().last().unwrap_or_default();
                self.spinner
                    .set_message(format!("reasoning: {}", truncate(last_line, 60)));
            }
            TurnUpdate::SchemaLoaded { tables } => {
                self.line(format!(
                    "  {}",
                    style(format!("schema loaded: {} table(s)", tables.len())).dim()
                ));
            }
            TurnUpdate::SqlGenerated { sql } => {
                self.line(format!("\n  {}", style("SQL").bold()));
                for line in sql.lines() {
                    self.line(format!("    {}", style(line).yellow()));
                }
            }
            TurnUpdate::SqlResult { result } => {
                self.line(format!(
                    "\n  {}",
                    style(format!("{} row(s)", result.row_count())).bold()
                ));
                self.line(result_table(result, MAX_TABLE_ROWS));
            }
            TurnUpdate::ChartReady { chart_type, .. } => {
                self.line(format!("  {} chart ready ({chart_type})", style("✓").green()));
            }
            TurnUpdate::Summary { content } => {
                self.summary = Some(content.clone());
            }
            TurnUpdate::MessageSaved { message } => {
                self.line(format!("  {}", style(format!("saved as {}", message.id)).dim()));
            }
            TurnUpdate::TitleUpdated { title } => {
                self.line(format!("  {} {}", style("title:").dim(), title));
            }
            TurnUpdate::Completed | TurnUpdate::Failed { .. } | TurnUpdate::Cancelled => {}
        }
    }

    /// Clear the spinner and print the answer. The answer is shown even
    /// when quiet.
    fn finish(self) {
        self.spinner.finish_and_clear();
        if let Some(summary) = self.summary {
            if self.quiet {
                println!("{summary}");
            } else {
                println!();
                println!("  {summary}");
                println!();
            }
        }
    }
}

/// Report how the turn ended. A failed turn becomes an error so the
/// process exits non-zero.
pub fn print_outcome(outcome: &TurnOutcome, mode: RenderMode) -> Result<()> {
    match outcome {
        TurnOutcome::Completed { message } => {
            if mode.json {
                if let Some(message) = message {
                    println!("{}", serde_json::to_string_pretty(message)?);
                }
            } else if message.is_none() && !mode.quiet {
                println!("  {}", style("turn finished without a stored answer").dim());
            }
            Ok(())
        }
        TurnOutcome::Cancelled => {
            if !mode.json {
                eprintln!("  {} cancelled", style("!").yellow().bold());
            }
            Ok(())
        }
        TurnOutcome::Failed { message, kind } => {
            tracing::debug!(?kind, "turn failed");
            bail!("{message}")
        }
    }
}

/// Print the live analysis panel state.
pub fn print_analysis(analysis: &AnalysisState, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(analysis)?);
        return Ok(());
    }
    if analysis.is_default() {
        println!("  {}", style("No analysis for this session.").dim());
        return Ok(());
    }

    println!();
    println!("  {} {}", style("Chart:").bold(), analysis.chart_type);
    if !analysis.sql.is_empty() {
        println!("  {}", style("SQL:").bold());
        for line in analysis.sql.lines() {
            println!("    {}", style(line).yellow());
        }
    }
    if let Some(result) = &analysis.sql_result {
        println!();
        println!("{}", result_table(result, MAX_TABLE_ROWS));
    }
    println!();
    Ok(())
}

/// Build a table for the first `max_rows` rows of a query result.
pub fn result_table(result: &SqlResult, max_rows: usize) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            result
                .columns
                .iter()
                .map(|c| Cell::new(c).fg(Color::Cyan))
                .collect::<Vec<_>>(),
        );

    for row in result.rows.iter().take(max_rows) {
        table.add_row(
            result
                .columns
                .iter()
                .enumerate()
                .map(|(idx, column)| Cell::new(cell_text(row, idx, column)))
                .collect::<Vec<_>>(),
        );
    }

    if result.row_count() > max_rows {
        let mut elided = vec![Cell::new(format!("… {} more", result.row_count() - max_rows))];
        elided.extend((1..result.columns.len()).map(|_| Cell::new("")));
        table.add_row(elided);
    }

    table
}

/// Text of one cell. Rows are usually objects keyed by column; arrays are
/// read by position.
pub fn cell_text(row: &Value, idx: usize, column: &str) -> String {
    let value = match row {
        Value::Object(map) => map.get(column),
        Value::Array(items) => items.get(idx),
        other if idx == 0 => Some(other),
        _ => None,
    };
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Truncate to `max` characters, appending an ellipsis when cut.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{cut}…")
    }
}
