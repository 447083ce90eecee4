//! Error types for the harvest pipeline

use thiserror::Error;

/// Fatal conditions of a harvest run
#[derive(Debug, Error)]
pub enum HarvestError {
    /// No usable credential was supplied
    #[error("Personal token is required. Set PERSONAL_TOKEN in the environment or .env file, or pass --token.")]
    MissingCredential,

    /// The source page contains no recognisable proxy table
    #[error("Could not find proxy table in the source page")]
    TableNotFound,

    /// Table rows were found but none of them produced a valid record
    #[error("No valid proxy records extracted from {rows} table rows")]
    NoRecords { rows: usize },

    /// The batch sequence handed to the uploader was empty
    #[error("No proxies to upload")]
    NothingToUpload,

    /// The source page could not be fetched
    #[error("Failed to fetch source page: {0:#}")]
    Fetch(#[source] anyhow::Error),

    /// A built-in row selector failed to parse
    #[error("Invalid row selector '{0}'")]
    InvalidSelector(String),
}

/// Why a single table row was dropped.
///
/// Rejections are per-row and never abort a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowRejection {
    #[error("row has {0} cells, expected at least 2")]
    TooFewCells(usize),

    #[error("address cell is empty")]
    MissingAddress,

    #[error("address '{0}' is not a dotted-quad IPv4 address")]
    InvalidAddress(String),

    #[error("port cell is empty")]
    MissingPort,

    #[error("port '{0}' is not a number in 1..=65535")]
    InvalidPort(String),
}
