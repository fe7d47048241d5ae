//! CLI command definitions for the `dchat` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod ask;
pub mod history;
pub mod render;
pub mod replay;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use datachat_types::chat::RagEngine;

/// Ask questions about your data and watch the analysis stream in.
#[derive(Parser)]
#[command(name = "dchat", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors and the final answer.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Backend base URL, overriding config.toml.
    #[arg(long, global = true, env = "DATACHAT_BASE_URL")]
    pub base_url: Option<String>,

    /// Data directory holding config.toml.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask a question and stream the answer.
    Ask {
        /// The question in natural language.
        question: String,

        /// Session to ask in (a new one is started when omitted).
        #[arg(long, short)]
        session: Option<String>,

        /// Stream the model's reasoning.
        #[arg(long)]
        thinking: bool,

        /// Search the knowledge base before generating SQL.
        #[arg(long)]
        rag: bool,

        /// Retrieval engine used with --rag (light, pro).
        #[arg(long)]
        rag_engine: Option<RagEngine>,
    },

    /// List the stored messages of a session.
    History {
        /// Session id.
        session: String,

        /// Re-open the analysis of the n-th message (1-based).
        #[arg(long)]
        show: Option<usize>,
    },

    /// Run a recorded event stream through the engine without a backend.
    Replay {
        /// File holding a raw `text/event-stream` body.
        file: PathBuf,

        /// Bytes per simulated network chunk.
        #[arg(long, default_value_t = 64)]
        chunk_size: usize,

        /// Session id the replayed turn belongs to.
        #[arg(long, default_value = "replay")]
        session: String,
    },

    /// Print the effective client configuration.
    Config,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
