//! Harvest pipeline driver
//!
//! A run moves strictly forward through
//! `Init → Extracting → Batching → Uploading → Finalized`, or drops from
//! `Extracting` to `Aborted` when the page yields nothing usable.

use crate::config::{Credential, HarvestConfig};
use crate::error::HarvestError;
use crate::proxy::batcher::{expected_batches, partition};
use crate::proxy::extractor::RecordExtractor;
use crate::proxy::models::ProxyRecord;
use crate::proxy::tracker::{format_elapsed, Completion, CompletionTracker};
use crate::proxy::uploader::{UploadCoordinator, UploadReport};
use crate::sink::{ArtifactSink, FsSink};
use crate::transport::{HttpTransport, Transport};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Stage of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Init,
    Extracting,
    Batching,
    Uploading { outstanding: usize },
    Finalized,
    Aborted,
}

impl PipelineStage {
    fn rank(self) -> u8 {
        match self {
            PipelineStage::Init => 0,
            PipelineStage::Extracting => 1,
            PipelineStage::Batching => 2,
            PipelineStage::Uploading { .. } => 3,
            PipelineStage::Finalized | PipelineStage::Aborted => 4,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineStage::Finalized | PipelineStage::Aborted)
    }

    /// Whether `next` is a legal successor of this stage
    pub fn can_advance_to(self, next: PipelineStage) -> bool {
        match (self, next) {
            (PipelineStage::Extracting, PipelineStage::Aborted) => true,
            (_, PipelineStage::Aborted) => false,
            (
                PipelineStage::Uploading { outstanding: before },
                PipelineStage::Uploading { outstanding: after },
            ) => after < before,
            (PipelineStage::Uploading { .. }, PipelineStage::Finalized) => true,
            (current, next) => !current.is_terminal() && next.rank() == current.rank() + 1,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::Init => write!(f, "init"),
            PipelineStage::Extracting => write!(f, "extracting"),
            PipelineStage::Batching => write!(f, "batching"),
            PipelineStage::Uploading { outstanding } => {
                write!(f, "uploading ({} outstanding)", outstanding)
            }
            PipelineStage::Finalized => write!(f, "finalized"),
            PipelineStage::Aborted => write!(f, "aborted"),
        }
    }
}

/// State owned by one run
#[derive(Debug)]
pub struct PipelineState {
    started_at: Instant,
    stage: PipelineStage,
    records: Vec<ProxyRecord>,
    expected_batches: usize,
}

impl PipelineState {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            stage: PipelineStage::Init,
            records: Vec::new(),
            expected_batches: 0,
        }
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn records(&self) -> &[ProxyRecord] {
        &self.records
    }

    pub fn expected_batches(&self) -> usize {
        self.expected_batches
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Move to `next`; illegal transitions are refused and logged
    pub fn advance(&mut self, next: PipelineStage) -> bool {
        if !self.stage.can_advance_to(next) {
            warn!(from = %self.stage, to = %next, "Refusing pipeline stage transition");
            return false;
        }
        info!(from = %self.stage, to = %next, "Pipeline stage");
        self.stage = next;
        true
    }

    /// Lower the outstanding batch count while uploading.
    ///
    /// An unchanged count is not a transition and leaves the stage alone.
    pub fn settle_outstanding(&mut self, outstanding: usize) -> bool {
        match self.stage {
            PipelineStage::Uploading { outstanding: current } if outstanding < current => {
                self.advance(PipelineStage::Uploading { outstanding })
            }
            _ => false,
        }
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a run that got past extraction
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub stage: PipelineStage,
    pub records: usize,
    pub batches: usize,
    pub acknowledged: usize,
    /// `HH:MM:SS`, present once finalized
    pub elapsed: Option<String>,
}

impl RunSummary {
    pub fn is_finalized(&self) -> bool {
        self.stage == PipelineStage::Finalized
    }
}

/// Drives one harvest run end to end
pub struct Pipeline {
    config: HarvestConfig,
    credential: Credential,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn ArtifactSink>,
}

impl Pipeline {
    pub fn new(
        config: HarvestConfig,
        credential: Credential,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn ArtifactSink>,
    ) -> Self {
        Self {
            config,
            credential,
            transport,
            sink,
        }
    }

    /// Build a pipeline on the HTTP transport and filesystem sink described
    /// by `config`
    pub fn from_config(config: HarvestConfig, credential: Credential) -> crate::Result<Self> {
        let transport = Arc::new(HttpTransport::with_config(config.transport.clone())?);
        let sink = Arc::new(FsSink::new(config.output_dir.clone()));
        Ok(Self::new(config, credential, transport, sink))
    }

    /// Fetch, extract, batch, upload and finalize.
    ///
    /// Returns an error when the source page cannot be fetched or yields no
    /// records; in that case nothing is uploaded and no artifact is written.
    pub async fn run(&self) -> std::result::Result<RunSummary, HarvestError> {
        let mut state = PipelineState::new();
        info!(
            source = %self.config.source_url,
            token = %self.credential,
            "Starting proxy harvest"
        );

        state.advance(PipelineStage::Extracting);
        let html = match self.transport.fetch(&self.config.source_url).await {
            Ok(html) => html,
            Err(e) => {
                state.advance(PipelineStage::Aborted);
                error!(error = %format_error(&e), "Failed to fetch source page");
                return Err(HarvestError::Fetch(e));
            }
        };

        let extractor = RecordExtractor::new()
            .with_policy(self.config.address_policy)
            .with_max_rows(self.config.max_rows);
        let page = match extractor.extract_page(&html) {
            Ok(page) => page,
            Err(e) => {
                state.advance(PipelineStage::Aborted);
                error!(error = %e, "Extraction aborted");
                return Err(e);
            }
        };
        state.records = page.records;

        if let Err(e) = self.sink.write_records(&state.records) {
            error!(error = %format_error(&e), "Error saving proxies");
        }

        state.advance(PipelineStage::Batching);
        let batches = partition(&state.records, self.config.batch_capacity);
        state.expected_batches = expected_batches(state.records.len(), self.config.batch_capacity);

        state.advance(PipelineStage::Uploading {
            outstanding: batches.len(),
        });
        let tracker = CompletionTracker::new(state.expected_batches, state.started_at);
        let coordinator = UploadCoordinator::new(
            Arc::clone(&self.transport),
            self.config.upload_url.clone(),
            self.credential.clone(),
        )
        .with_concurrency(self.config.concurrency);
        let report = coordinator.upload(batches, &tracker).await?;

        let acknowledged = report.acknowledged();
        let elapsed = self.conclude(&mut state, &report);

        Ok(RunSummary {
            stage: state.stage,
            records: state.records.len(),
            batches: state.expected_batches,
            acknowledged,
            elapsed,
        })
    }

    fn conclude(&self, state: &mut PipelineState, report: &UploadReport) -> Option<String> {
        let outstanding = state.expected_batches - report.acknowledged().min(state.expected_batches);
        if outstanding > 0 {
            state.settle_outstanding(outstanding);
        }

        match &report.completion {
            Some(completion) => {
                let elapsed = self.finalize(state, completion);
                Some(elapsed)
            }
            None => {
                warn!(
                    acknowledged = report.acknowledged(),
                    expected = state.expected_batches,
                    "Upload incomplete, results not written"
                );
                None
            }
        }
    }

    /// Write the result map and run duration; failures are logged only
    fn finalize(&self, state: &mut PipelineState, completion: &Completion) -> String {
        state.advance(PipelineStage::Finalized);

        if let Err(e) = self.sink.write_results(&completion.results) {
            error!(error = %format_error(&e), "Error saving results");
        }

        let elapsed = format_elapsed(completion.elapsed);
        if let Err(e) = self.sink.write_elapsed(&elapsed) {
            error!(error = %format_error(&e), "Error saving execution time");
        }

        info!(
            proxies = state.records.len(),
            batches = completion.results.len(),
            elapsed = %elapsed,
            "Harvest completed successfully"
        );
        elapsed
    }
}

/// Error with its full context chain on one line
fn format_error(e: &anyhow::Error) -> String {
    format!("{:#}", e)
}
