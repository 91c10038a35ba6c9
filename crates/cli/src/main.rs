//! MedTriage CLI: the main entry point.
//!
//! Commands:
//! - `onboard`  Write the default config
//! - `serve`    Start the HTTP gateway
//! - `history`  Print the event log
//! - `triage`   Triage a free-text complaint
//! - `note`     Record a history note
//! - `report`   Synthesize a SOAP report
//! - `delete`   Remove one event by id
//! - `doctor`   Diagnose config, API key, engine, and store

use clap::{Parser, Subcommand};
use medtriage_core::event::{EventId, EventKind};

mod commands;

#[derive(Parser)]
#[command(
    name = "medtriage",
    about = "MedTriage: symptom triage over a persistent patient event log",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "MEDTRIAGE_LOG_JSON")]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration
    Onboard,

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the event log, oldest first
    History {
        /// Only show events of this kind (symptom, image_analysis, history_note)
        #[arg(short, long)]
        kind: Vec<EventKind>,

        /// Show at most this many of the newest matching events
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Triage a free-text symptom description
    Triage {
        /// The complaint, in any language
        text: String,
    },

    /// Record a free-form history note
    Note {
        /// The note, stored verbatim
        text: String,
    },

    /// Synthesize a SOAP report from recent events
    Report,

    /// Delete one event by id
    Delete {
        /// The event id
        id: EventId,
    },

    /// Diagnose system health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::History { kind, limit } => commands::history::run(&kind, limit).await?,
        Commands::Triage { text } => commands::triage::run(&text).await?,
        Commands::Note { text } => commands::note::run(&text).await?,
        Commands::Report => commands::report::run().await?,
        Commands::Delete { id } => commands::delete::run(id).await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
