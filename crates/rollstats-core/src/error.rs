//! Error types for rollstats.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RollStatsError {
    #[error("Invalid integer for field '{field}': {value:?}")]
    InvalidInteger { field: String, value: String },

    #[error("Invalid die face in field '{field}': {value:?}")]
    InvalidDice { field: String, value: String },

    #[error("Campaign not found: {0}")]
    CampaignNotFound(String),

    #[error("Sheet not found: {campaign}/{sheet}")]
    SheetNotFound { campaign: String, sheet: String },

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Relay queue is full")]
    RelayQueueFull,

    #[error("Relay is not running")]
    RelayClosed,

    #[error("Relay sink error: {0}")]
    RelaySink(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
