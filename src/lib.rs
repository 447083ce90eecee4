//! Proxy Harvest - Proxy Listing Harvester
//!
//! Scrapes a public proxy listing, validates each row into a proxy record,
//! and redistributes the records to a collection endpoint in bounded batches,
//! tracking the acknowledgement id returned for every batch.

pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod proxy;
pub mod sink;
pub mod transport;

pub use config::{Credential, HarvestConfig};
pub use error::{HarvestError, RowRejection};
pub use pipeline::{Pipeline, PipelineStage, RunSummary};
pub use proxy::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
