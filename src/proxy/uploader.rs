//! Concurrent batch submission to the collection endpoint

use crate::config::Credential;
use crate::error::HarvestError;
use crate::proxy::ack::parse_acknowledgement;
use crate::proxy::models::{AcknowledgementId, Batch};
use crate::proxy::tracker::{Completion, CompletionTracker};
use crate::transport::Transport;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{error, info};

/// Form field carrying the personal token
pub const TOKEN_FIELD: &str = "personal_token";

/// Form field carrying the newline-joined endpoints
pub const PROXIES_FIELD: &str = "proxies";

/// What happened to one submitted batch
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub index: usize,
    pub size: usize,
    pub ack: Option<AcknowledgementId>,
    pub error: Option<String>,
}

impl BatchOutcome {
    fn acknowledged(batch: &Batch, ack: AcknowledgementId) -> Self {
        Self {
            index: batch.index,
            size: batch.len(),
            ack: Some(ack),
            error: None,
        }
    }

    fn failed(batch: &Batch, error: String) -> Self {
        Self {
            index: batch.index,
            size: batch.len(),
            ack: None,
            error: Some(error),
        }
    }

    pub fn is_acknowledged(&self) -> bool {
        self.ack.is_some()
    }
}

/// Outcome of uploading every batch of a run
#[derive(Debug, Clone)]
pub struct UploadReport {
    /// One outcome per batch, sorted by batch index
    pub outcomes: Vec<BatchOutcome>,
    /// Set when the last outstanding batch was acknowledged
    pub completion: Option<Completion>,
}

impl UploadReport {
    pub fn acknowledged(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_acknowledged()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.acknowledged()
    }
}

/// Submits batches and routes each response through the tracker
pub struct UploadCoordinator {
    transport: Arc<dyn Transport>,
    upload_url: String,
    credential: Credential,
    concurrency: usize,
}

impl UploadCoordinator {
    pub fn new(
        transport: Arc<dyn Transport>,
        upload_url: impl Into<String>,
        credential: Credential,
    ) -> Self {
        Self {
            transport,
            upload_url: upload_url.into(),
            credential,
            concurrency: crate::config::DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Submit every batch without waiting on earlier responses.
    ///
    /// Submissions start in batch order and complete in any order. A failed
    /// submission is logged and left unacknowledged; it never stops the
    /// others.
    pub async fn upload(
        &self,
        batches: Vec<Batch>,
        tracker: &CompletionTracker,
    ) -> std::result::Result<UploadReport, HarvestError> {
        if batches.is_empty() {
            return Err(HarvestError::NothingToUpload);
        }

        info!(
            batches = batches.len(),
            url = %self.upload_url,
            token = %self.credential,
            "Uploading proxy batches"
        );

        let results: Vec<(BatchOutcome, Option<Completion>)> = stream::iter(batches)
            .map(|batch| self.submit_batch(batch, tracker))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut completion = None;
        let mut outcomes = Vec::with_capacity(results.len());
        for (outcome, done) in results {
            if done.is_some() {
                completion = done;
            }
            outcomes.push(outcome);
        }
        outcomes.sort_by_key(|outcome| outcome.index);

        Ok(UploadReport {
            outcomes,
            completion,
        })
    }

    async fn submit_batch(
        &self,
        batch: Batch,
        tracker: &CompletionTracker,
    ) -> (BatchOutcome, Option<Completion>) {
        let payload = batch.payload();
        let form = [
            (TOKEN_FIELD, self.credential.expose()),
            (PROXIES_FIELD, payload.as_str()),
        ];

        match self.transport.submit_form(&self.upload_url, &form).await {
            Ok(body) => {
                info!(batch = batch.index + 1, "Processing upload response");
                let ack = parse_acknowledgement(&body, batch.index);
                let completion = tracker.record(&ack, &batch).await;
                (BatchOutcome::acknowledged(&batch, ack), completion)
            }
            Err(e) => {
                let message = format!("{:#}", e);
                error!(batch = batch.index + 1, error = %message, "Batch upload failed");
                (BatchOutcome::failed(&batch, message), None)
            }
        }
    }
}
