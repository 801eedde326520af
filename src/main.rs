//! # Task Master CLI (`taskmaster`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `taskmaster serve` | Start the HTTP server |
//! | `taskmaster sync <payload.json>` | Replace the index with a task/note snapshot |
//! | `taskmaster ask "<question>"` | Answer a question from the index |
//! | `taskmaster quote` | Print the quote of the day |
//!
//! ## Examples
//!
//! ```bash
//! taskmaster --config ./config/taskmaster.toml serve
//! taskmaster sync ./snapshot.json
//! taskmaster ask "What should I buy?" --k 3
//! PORT=9000 AI_PROVIDER=ollama AI_MODEL=llama3 taskmaster serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use taskmaster_rag::{chat, config, ingest, quotes, server};

/// Task Master: retrieval-augmented answers over your tasks and notes.
///
/// Settings come from an optional TOML file, then environment variables.
#[derive(Parser)]
#[command(name = "taskmaster", version)]
struct Cli {
    /// Path to a configuration file (TOML). Built-in defaults apply without one.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server on `server.host:server.port`.
    Serve,

    /// Replace the index with the tasks and notes in a JSON file.
    ///
    /// The file has the `POST /train` body shape:
    /// `{"tasks": [...], "notes": [...]}`.
    Sync {
        /// Path to the snapshot file.
        payload: PathBuf,
    },

    /// Ask a question against the indexed tasks and notes.
    Ask {
        question: String,

        /// Number of documents to retrieve (defaults to `retrieval.default_k`).
        #[arg(long)]
        k: Option<usize>,

        /// Print the answer once it is complete instead of streaming it.
        #[arg(long)]
        no_stream: bool,
    },

    /// Print the quote of the day.
    Quote {
        /// Day of the year to use instead of today.
        #[arg(long)]
        day: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(cli.config.as_deref())?;

    // stdout carries command output; logs go to stderr.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.server.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Sync { payload } => {
            ingest::run_sync(&cfg, &payload).await?;
        }
        Commands::Ask {
            question,
            k,
            no_stream,
        } => {
            chat::run_ask(&cfg, &question, k, !no_stream).await?;
        }
        Commands::Quote { day } => {
            quotes::run_quote(&cfg, day);
        }
    }

    Ok(())
}
