//! # repochat CLI
//!
//! ```bash
//! repochat --config ./config/repochat.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `repochat init` | Create the SQLite index and run schema migrations |
//! | `repochat ingest <url>` | Fetch, chunk, embed and store a repository |
//! | `repochat ask <url> "<question>"` | Answer one question |
//! | `repochat chat <url>` | Interactive conversation over stdin |
//! | `repochat search <url> "<query>"` | Show the chunks a query retrieves |
//! | `repochat collections` | List indexed repositories |
//!
//! Logs go to stderr and follow `RUST_LOG` (default `repochat=info`).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use repochat::ingest::IngestArgs;
use repochat::{chat, config, ingest, migrate, search, stats};

/// Ask questions about a GitHub repository.
#[derive(Parser)]
#[command(
    name = "repochat",
    about = "Ask questions about a GitHub repository using retrieval-augmented generation",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = "./config/repochat.toml")]
    config: PathBuf,

    /// Log at debug level unless RUST_LOG is set.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the index database. Idempotent.
    Init,

    /// Index a repository.
    ///
    /// Lists the repository tree, downloads every file, splits the files
    /// into overlapping chunks and stores their embeddings in the
    /// repository's collection. Re-running on unchanged content adds
    /// nothing.
    Ingest {
        /// Repository URL, e.g. `https://github.com/owner/repo`.
        url: String,

        /// Branch to read (overrides `[github].branch`).
        #[arg(long)]
        branch: Option<String>,

        /// Only index common source-code file extensions.
        #[arg(long)]
        code_only: bool,

        /// Overwrite stored chunks whose content changed.
        #[arg(long)]
        replace: bool,
    },

    /// Ask a single question about an indexed repository.
    Ask {
        url: String,
        question: String,
    },

    /// Chat about a repository interactively.
    Chat {
        url: String,

        /// Ingest the repository before chatting.
        #[arg(long)]
        process: bool,
    },

    /// Show the nearest chunks for a query without calling the chat model.
    Search {
        url: String,
        query: String,

        /// Number of hits (defaults to `[chat].top_k`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// List indexed repositories and their record counts.
    Collections,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "repochat=debug" } else { "repochat=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Index initialized at {}", cfg.db_path().display());
        }
        Commands::Ingest {
            url,
            branch,
            code_only,
            replace,
        } => {
            let args = IngestArgs {
                branch,
                code_only,
                replace,
            };
            ingest::run_ingest(&cfg, &url, &args).await?;
        }
        Commands::Ask { url, question } => {
            chat::run_ask(&cfg, &url, &question).await?;
        }
        Commands::Chat { url, process } => {
            chat::run_chat(&cfg, &url, process).await?;
        }
        Commands::Search { url, query, limit } => {
            search::run_search(&cfg, &url, &query, limit).await?;
        }
        Commands::Collections => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
