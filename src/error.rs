use thiserror::Error;

#[derive(Error, Debug)]
pub enum HydroError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("No bid elements found (expected <bid>, <estimate> or <item>)")]
    NoBidElements,

    #[error("Unknown bid: {0}")]
    UnknownBid(i64),

    #[error("Unknown status: {0}")]
    UnknownStatus(String),

    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    #[error("Invalid move: {0}")]
    InvalidMove(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Bid {0} has already been converted to a job")]
    AlreadyConverted(String),

    #[error("Cannot delete bid {0}: it was converted to job {1}")]
    BidHasJob(i64, String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, HydroError>;
