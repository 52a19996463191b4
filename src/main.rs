//! # Crosslink CLI (`xl`)
//!
//! The `xl` binary keeps a document corpus cross-linked. It indexes the
//! pages under a content root, proposes and commits related-page links
//! under a per-document budget, and maintains a PageRank-style authority
//! score for every page.
//!
//! ## Usage
//!
//! ```bash
//! xl --config ./config/xl.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `xl init` | Create the SQLite database and run schema migrations |
//! | `xl sync` | Index the content root, relink changed pages, rescore |
//! | `xl changed <id>` | Process one changed document |
//! | `xl deleted <id>` | Process one deleted document |
//! | `xl search "<query>"` | BM25 search over publishable documents |
//! | `xl candidates <id>` | Show link candidates for a document |
//! | `xl links <id>` | Show a document's outbound and inbound links |
//! | `xl link <src> <tgt>` | Add a link by hand |
//! | `xl scores` | List documents by authority |
//! | `xl recompute` | Recompute authority |
//! | `xl status` | Corpus and graph overview |
//! | `xl export` | Dump documents and links as JSON |
//!
//! Set `RUST_LOG` (e.g. `RUST_LOG=crosslink_core=debug`) for diagnostics
//! on stderr.

mod config;
mod connector_fs;
mod db;
mod export;
mod ingest;
mod links;
mod migrate;
mod progress;
mod search;
mod sqlite_store;
mod stats;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crosslink_core::models::LinkType;

use crate::progress::ProgressMode;

/// Crosslink CLI: incremental cross-linking and authority scoring for
/// document corpora.
#[derive(Parser)]
#[command(
    name = "xl",
    about = "Crosslink: incremental cross-linking and authority scoring for document corpora",
    version,
    long_about = "Crosslink indexes the HTML pages under a content root, proposes related-page \
    links ranked by BM25 relevance, commits them under a per-page outbound budget, and keeps a \
    PageRank-style authority score for every page up to date as content changes."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/xl.toml`.
    #[arg(long, global = true, default_value = "./config/xl.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables. Running
    /// it more than once is safe.
    Init,

    /// Bring the database in line with the content root.
    ///
    /// Indexes every matching document, removes documents that no longer
    /// exist, relinks documents whose content changed, and recomputes
    /// authority.
    Sync {
        /// Relink every document and recompute authority from scratch.
        #[arg(long)]
        full: bool,

        /// Progress output on stderr: `auto`, `off`, `human`, or `json`.
        #[arg(long, default_value = "auto")]
        progress: ProgressMode,
    },

    /// Process a single changed document.
    Changed {
        /// Document id (path relative to the content root).
        id: String,
    },

    /// Process a single deleted document.
    Deleted {
        /// Document id (path relative to the content root).
        id: String,
    },

    /// Search publishable documents.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Show ranked link candidates for a document.
    Candidates {
        /// Source document id.
        id: String,

        /// Maximum number of candidates; defaults to `linking.max_candidates`.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show a document's outbound and inbound links.
    Links {
        /// Document id.
        id: String,
    },

    /// Add a link by hand.
    ///
    /// Subject to the same checks as discovered links: no self-links, no
    /// duplicates, and the source's outbound budget.
    Link {
        /// Source document id.
        source: String,

        /// Target document id.
        target: String,

        /// Anchor text; defaults to the target's title.
        #[arg(long)]
        anchor: Option<String>,

        /// Link type: `semantic`, `keyword`, or `manual`.
        #[arg(long = "type", default_value = "manual")]
        link_type: LinkType,
    },

    /// List documents by authority score.
    Scores {
        /// Maximum number of documents to list.
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Recompute authority scores.
    Recompute {
        /// Recompute from the uniform distribution instead of incrementally.
        #[arg(long)]
        full: bool,
    },

    /// Show corpus, link, and score totals.
    Status,

    /// Export documents, links, and scores as JSON.
    Export {
        /// Output file path; stdout if omitted.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sync { full, progress } => {
            ingest::run_sync(&cfg, full, progress).await?;
        }
        Commands::Changed { id } => {
            links::run_changed(&cfg, &id).await?;
        }
        Commands::Deleted { id } => {
            links::run_deleted(&cfg, &id).await?;
        }
        Commands::Search { query, limit } => {
            search::run_search(&cfg, &query, limit).await?;
        }
        Commands::Candidates { id, limit } => {
            search::run_candidates(&cfg, &id, limit).await?;
        }
        Commands::Links { id } => {
            links::run_links(&cfg, &id).await?;
        }
        Commands::Link {
            source,
            target,
            anchor,
            link_type,
        } => {
            links::run_link(&cfg, &source, &target, anchor.as_deref(), link_type).await?;
        }
        Commands::Scores { limit } => {
            links::run_scores(&cfg, limit).await?;
        }
        Commands::Recompute { full } => {
            links::run_recompute(&cfg, full).await?;
        }
        Commands::Status => {
            stats::run_status(&cfg).await?;
        }
        Commands::Export { output } => {
            export::run_export(&cfg, output.as_deref()).await?;
        }
    }

    Ok(())
}
