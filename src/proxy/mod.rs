//! Proxy module for harvesting and redistributing proxies
//!
//! This module provides functionality for:
//! - Extracting proxy records from listing table rows
//! - Classifying the protocols each proxy supports
//! - Partitioning records into upload batches
//! - Submitting batches and reconciling their acknowledgement ids

pub mod ack;
pub mod batcher;
pub mod classifier;
pub mod extractor;
pub mod models;
pub mod tracker;
pub mod uploader;

pub use ack::{match_acknowledgement, parse_acknowledgement};
pub use batcher::{expected_batches, partition, DEFAULT_BATCH_CAPACITY};
pub use classifier::classify_protocols;
pub use extractor::{AddressPolicy, PageExtraction, RawCell, RawRow, RecordExtractor};
pub use models::{
    AckSource, AcknowledgementId, Batch, ProtocolSet, ProtocolTag, ProxyRecord, ResultMap,
};
pub use tracker::{format_elapsed, Completion, CompletionTracker};
pub use uploader::{BatchOutcome, UploadCoordinator, UploadReport};
