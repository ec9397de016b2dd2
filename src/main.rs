//! # Catalog Sync CLI (`csync`)
//!
//! The `csync` binary reconciles the product catalog against supplier
//! feeds and manages the history log used to undo a run.
//!
//! ## Usage
//!
//! ```bash
//! csync --config ./config/csync.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `csync init` | Create the SQLite database and schema |
//! | `csync reconcile <file>` | Reconcile a CSV, TSV or JSON feed |
//! | `csync history list` | List retained history entries |
//! | `csync history show <id>` | Show one history entry |
//! | `csync restore <id>` | Restore the catalog as it was before a run |
//! | `csync stats` | Catalog and history counts |
//! | `csync export` | Dump the catalog as JSON |
//!
//! ## Examples
//!
//! ```bash
//! # Preview a feed without writing anything
//! csync reconcile ./feeds/spring.csv --dry-run
//!
//! # Apply it and zero the stock of everything the feed left out
//! csync reconcile ./feeds/spring.csv --sync-stock
//!
//! # Undo that run
//! csync history list
//! csync restore 3f2c9a4e-...
//! ```
//!
//! Logs go to stderr and honor `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use catalog_sync::{config, export, history, migrate, reconcile, stats};

/// Catalog Sync CLI: reconcile a product catalog against supplier feeds.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/csync.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "csync",
    about = "Catalog Sync — reconcile a product catalog against supplier feeds",
    version,
    long_about = "Catalog Sync matches each row of a supplier feed to a catalog entry \
    (by id, then model reference, color and size), applies the differences, optionally \
    zeroes the stock of entries the feed omits, and keeps a bounded history that can \
    restore the catalog to its state before any recent run."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/csync.toml`.
    #[arg(long, global = true, default_value = "./config/csync.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the catalog, history and lease
    /// tables. Running it more than once is safe.
    Init,

    /// Reconcile a feed file against the catalog.
    ///
    /// Every row is matched to at most one catalog entry. Matched entries
    /// are updated, unmatched rows become new entries, and ambiguous rows
    /// are reported with their candidates and left alone.
    Reconcile {
        /// Feed file: `.csv`, `.tsv` or `.json`.
        file: PathBuf,

        /// Zero the stock of catalog entries the feed does not mention.
        #[arg(long)]
        sync_stock: bool,

        /// Report what would change without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Print the full report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Inspect the run history.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Restore the catalog to its state before a recorded run.
    ///
    /// Entries the run inserted are kept; everything in the run's snapshot
    /// is written back.
    Restore {
        /// History entry id (see `csync history list`).
        id: String,

        /// Print the restore report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show catalog statistics.
    Stats,

    /// Export the catalog as JSON.
    Export {
        /// Output file path. Writes to stdout if omitted.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

/// History subcommands.
#[derive(Subcommand)]
enum HistoryAction {
    /// List retained history entries, newest first.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show the recorded detail of one history entry.
    Show {
        id: String,
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
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
        Commands::Reconcile {
            file,
            sync_stock,
            dry_run,
            json,
        } => {
            reconcile::run_reconcile(&cfg, &file, sync_stock, dry_run, json).await?;
        }
        Commands::History { action } => match action {
            HistoryAction::List { json } => {
                history::run_history_list(&cfg, json).await?;
            }
            HistoryAction::Show { id, json } => {
                history::run_history_show(&cfg, &id, json).await?;
            }
        },
        Commands::Restore { id, json } => {
            history::run_restore(&cfg, &id, json).await?;
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
