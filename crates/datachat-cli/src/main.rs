//! datachat command-line entry point.
//!
//! Binary name: `dchat`
//!
//! Parses CLI arguments, wires the conversation service against the chat
//! backend, then dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,dchat=debug,datachat_core=debug,datachat_infra=debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Shell completions and offline replays don't need the backend
    match &cli.command {
        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            generate(*shell, &mut cmd, "dchat", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Replay {
            file,
            chunk_size,
            session,
        } => {
            return cli::replay::replay(file, *chunk_size, session, cli.json, cli.quiet).await;
        }
        _ => {}
    }

    let state = AppState::init(cli.base_url.as_deref(), cli.data_dir.clone()).await?;

    match cli.command {
        Commands::Ask {
            question,
            session,
            thinking,
            rag,
            rag_engine,
        } => {
            let session = session.unwrap_or_else(|| uuid::Uuid::now_v7().to_string());
            let options = cli::ask::AskOptions {
                thinking,
                rag,
                rag_engine,
            };
            cli::ask::ask(&state, &session, &question, options, cli.json, cli.quiet).await?;
        }

        Commands::History { session, show } => {
            cli::history::history(&state, &session, show, cli.json).await?;
        }

        Commands::Config => {
            cli::history::show_config(&state, cli.json)?;
        }

        Commands::Completions { .. } | Commands::Replay { .. } => unreachable!("handled above"),
    }

    Ok(())
}
