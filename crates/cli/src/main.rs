//! Hindsight CLI — the main entry point.
//!
//! Commands:
//! - `serve`    — Start the HTTP API server
//! - `peek`     — One-shot semantic peek against the archive
//! - `sessions` — List chat sessions

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "hindsight",
    about = "Hindsight — semantic search and chat over your conversation archive",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one semantic peek and print the histogram + matches
    Peek {
        /// The search query
        query: String,

        /// Candidate-set size (histogram population)
        #[arg(long)]
        top_k: Option<usize>,

        /// Histogram bucket width in days
        #[arg(long)]
        bin_days: Option<u32>,

        /// How many snippet previews to print
        #[arg(long)]
        snippets: Option<usize>,
    },

    /// List chat sessions
    Sessions {
        /// Include archived sessions
        #[arg(long)]
        include_archived: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Peek {
            query,
            top_k,
            bin_days,
            snippets,
        } => commands::peek::run(query, top_k, bin_days, snippets).await?,
        Commands::Sessions { include_archived } => {
            commands::sessions::run(include_archived).await?
        }
    }

    Ok(())
}
