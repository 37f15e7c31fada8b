pub mod bids;
pub mod board;
pub mod import;
pub mod init;
pub mod jobs;
pub mod status;

use clap::{Parser, Subcommand};

use crate::db::get_connection;
use crate::error::{HydroError, Result};
use crate::settings::Settings;
use crate::store::SqliteStore;

/// Opens the store configured in settings. The database must already exist.
pub(crate) fn open_store(settings: &Settings) -> Result<SqliteStore> {
    let db_path = settings.db_path();
    if !db_path.exists() {
        return Err(HydroError::Other(
            "Database not found. Run `hydrops init` to set up.".to_string(),
        ));
    }
    Ok(SqliteStore::new(get_connection(&db_path)?))
}

/// Converts a 1-based position from the command line to an index.
pub(crate) fn position_index(position: Option<usize>) -> Option<usize> {
    position.map(|p| p.saturating_sub(1))
}

#[derive(Parser)]
#[command(
    name = "hydrops",
    about = "Bid intake, pipeline board and job cards for a hydrodemolition contractor."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for hydrops data (default: ~/Documents/hydrops)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Name recorded on imports and job cards
        #[arg(long)]
        user: Option<String>,
    },
    /// Import bids from a CSV or XML estimating export.
    Import {
        /// Path to the CSV or XML file
        file: String,
        /// Format key (csv, xml); detected from the file when omitted
        #[arg(long)]
        format: Option<String>,
        /// Parse and preview without saving
        #[arg(long = "dry-run")]
        dry_run: bool,
    },
    /// Manage bids.
    Bids {
        #[command(subcommand)]
        command: BidsCommands,
    },
    /// Show the bid pipeline board, or move a bid between columns.
    Board {
        #[command(subcommand)]
        command: Option<BoardCommands>,
    },
    /// Manage job cards.
    Jobs {
        #[command(subcommand)]
        command: JobsCommands,
    },
    /// Show current database and summary statistics.
    Status,
}

#[derive(Subcommand)]
pub enum BidsCommands {
    /// List bids, newest first.
    List {
        /// Only bids with this status: draft, submitted, won, lost, cancelled
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one bid.
    Show {
        /// Bid ID (shown in `hydrops bids list`)
        id: i64,
    },
    /// Delete a bid.
    Delete {
        /// Bid ID (shown in `hydrops bids list`)
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum BoardCommands {
    /// Move a bid to another column (or another position in its column).
    Move {
        /// Bid ID
        id: i64,
        /// Destination column: draft, submitted, won, lost, cancelled
        status: String,
        /// 1-based position in the destination column (default: top)
        #[arg(long)]
        position: Option<usize>,
    },
}

#[derive(Subcommand)]
pub enum JobsCommands {
    /// Create a job card from a bid and mark the bid won.
    Convert {
        /// Bid ID
        bid_id: i64,
    },
    /// List job cards.
    List,
    /// Show a job card with its cost codes.
    Show {
        /// Job ID (shown in `hydrops jobs list`)
        id: i64,
    },
}
