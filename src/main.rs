//! # shelfscrape CLI (`shelf`)
//!
//! The `shelf` binary is the primary interface for shelfscrape. It provides
//! commands for database initialization, crawling, single-page checks and
//! inspecting what has been stored.
//!
//! ## Usage
//!
//! ```bash
//! shelf --config ./config/shelf.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `shelf init` | Create the SQLite database and run schema migrations |
//! | `shelf crawl` | Discover and crawl books, write books/metrics/reviews |
//! | `shelf fetch <url>` | Extract one detail page and print it, no writes |
//! | `shelf show <id-or-url>` | Print a stored book with metrics and reviews |
//! | `shelf stats` | Counts, per-tag breakdown, recent runs |
//! | `shelf export` | JSON export of books with tags and metric history |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `shelfscrape=info,shelfscrape_core=info`).

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use shelfscrape::config::{self, CrawlOverrides};
use shelfscrape::ingest::{self, CrawlOptions};
use shelfscrape::progress::ProgressMode;
use shelfscrape::{export, get, migrate, stats};

const DEFAULT_LOG_FILTER: &str = "shelfscrape=info,shelfscrape_core=info";

/// shelfscrape: bulk book-catalogue crawler.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/shelf.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "shelf",
    about = "shelfscrape: discover, fetch and store books, daily metrics and reviews",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/shelf.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all tables. Running it again is
    /// harmless.
    Init,

    /// Discover book pages and crawl them.
    ///
    /// Walks the listing pages of each category, then fetches, extracts and
    /// stores every discovered book with bounded concurrency. With `--url`,
    /// skips discovery and crawls exactly those pages.
    Crawl {
        /// Category to discover (repeatable). Replaces `crawl.categories`.
        #[arg(long = "category")]
        categories: Vec<String>,

        /// Listing pages per category.
        #[arg(long)]
        max_pages: Option<u32>,

        /// Maximum detail pages in flight.
        #[arg(long)]
        concurrency: Option<usize>,

        /// Crawl at most this many books.
        #[arg(long)]
        limit: Option<usize>,

        /// Do not re-fetch books that are already stored.
        #[arg(long)]
        skip_existing: bool,

        /// Stop after discovery and print the work set.
        #[arg(long)]
        dry_run: bool,

        /// Crawl this detail page instead of discovering (repeatable).
        #[arg(long = "url")]
        urls: Vec<String>,

        /// Day to file metric snapshots under (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        observed_on: Option<NaiveDate>,

        /// Progress on stderr. Defaults to human on a TTY, off otherwise.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,

        /// Print the run summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Fetch and extract a single detail page without writing anything.
    Fetch {
        /// Detail-page URL.
        url: String,
    },

    /// Show a stored book with its metric history and reviews.
    Show {
        /// Book id (e.g. `GR_4671`) or any detail-page URL for it.
        book: String,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show database statistics.
    Stats,

    /// Export books, tags and metric history as JSON.
    Export {
        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Crawl {
            categories,
            max_pages,
            concurrency,
            limit,
            skip_existing,
            dry_run,
            urls,
            observed_on,
            progress,
            json,
        } => {
            let cfg = cfg.with_overrides(&CrawlOverrides {
                categories,
                max_pages,
                concurrency,
                limit,
                skip_existing,
            })?;
            let opts = CrawlOptions {
                urls,
                dry_run,
                progress: progress.unwrap_or_else(ProgressMode::default_for_tty),
                json,
                observed_on,
            };

            let cancel = Arc::new(AtomicBool::new(false));
            {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        warn!("interrupted: no new items will start");
                        cancel.store(true, Ordering::SeqCst);
                    }
                });
            }

            ingest::run_crawl(&cfg, &opts, &cancel).await?;
        }
        Commands::Fetch { url } => {
            ingest::run_fetch(&cfg, &url).await?;
        }
        Commands::Show { book, json } => {
            get::run_show(&cfg, &book, json).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Export { output } => {
            export::run_export(&cfg, output.as_deref()).await?;
        }
    }

    Ok(())
}
