//! Completion tracking for acknowledged upload batches

use crate::proxy::models::{AcknowledgementId, Batch, ResultMap};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Snapshot produced once every expected batch has been acknowledged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub results: ResultMap,
    pub elapsed: Duration,
}

impl Completion {
    /// Elapsed run time as `HH:MM:SS`
    pub fn elapsed_display(&self) -> String {
        format_elapsed(self.elapsed)
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    results: ResultMap,
    /// Batch index that last wrote each key
    writers: HashMap<String, usize>,
    acknowledged: HashSet<usize>,
    finalized: bool,
}

/// Accumulates per-batch acknowledgements and detects completion.
///
/// All updates go through one mutex, so acknowledgements may arrive in any
/// order and from any task. Completion is reported exactly once.
#[derive(Debug)]
pub struct CompletionTracker {
    expected: usize,
    started_at: Instant,
    state: Mutex<TrackerState>,
}

impl CompletionTracker {
    pub fn new(expected: usize, started_at: Instant) -> Self {
        Self {
            expected,
            started_at,
            state: Mutex::new(TrackerState::default()),
        }
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Record one batch acknowledgement.
    ///
    /// Returns the completion snapshot on the observation that acknowledges
    /// the last outstanding batch, and `None` otherwise. Duplicate or late
    /// observations after completion are ignored.
    pub async fn record(&self, id: &AcknowledgementId, batch: &Batch) -> Option<Completion> {
        let mut state = self.state.lock().await;

        if state.finalized {
            debug!(batch = batch.index, save_id = %id, "Ignoring acknowledgement after finalization");
            return None;
        }

        let key = id.as_str().to_string();
        if let Some(previous) = state.writers.insert(key.clone(), batch.index) {
            if previous != batch.index {
                warn!(
                    save_id = %id,
                    batch = batch.index,
                    displaced_batch = previous,
                    "Duplicate save_id, earlier batch entry overwritten"
                );
            }
        }
        state.results.insert(key, batch.endpoints());
        state.acknowledged.insert(batch.index);

        info!(
            batch = batch.index + 1,
            save_id = %id,
            acknowledged = state.acknowledged.len(),
            expected = self.expected,
            "Batch uploaded"
        );

        if state.acknowledged.len() >= self.expected {
            state.finalized = true;
            return Some(Completion {
                results: state.results.clone(),
                elapsed: self.started_at.elapsed(),
            });
        }
        None
    }

    /// Number of distinct batches acknowledged so far
    pub async fn acknowledged(&self) -> usize {
        self.state.lock().await.acknowledged.len()
    }

    pub async fn is_finalized(&self) -> bool {
        self.state.lock().await.finalized
    }

    /// Copy of the result map as it stands
    pub async fn results(&self) -> ResultMap {
        self.state.lock().await.results.clone()
    }
}

/// Format a duration as `HH:MM:SS`, truncating sub-second parts
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::models::{ProtocolSet, ProxyRecord};
    use std::sync::Arc;

    fn batch(index: usize, size: usize) -> Batch {
        let members = (0..size)
            .map(|i| {
                ProxyRecord::new(format!("10.{}.0.{}", index, i), 80, ProtocolSet::default())
                    .unwrap()
            })
            .collect();
        Batch::new(index, members)
    }

    fn ack(value: &str) -> AcknowledgementId {
        AcknowledgementId::extracted(value, "test").unwrap()
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "00:00:00");
        assert_eq!(format_elapsed(Duration::from_millis(59_999)), "00:00:59");
        assert_eq!(format_elapsed(Duration::from_secs(3_725)), "01:02:05");
        assert_eq!(format_elapsed(Duration::from_secs(100 * 3600)), "100:00:00");
    }

    #[tokio::test]
    async fn test_completes_exactly_once() {
        let tracker = CompletionTracker::new(3, Instant::now());
        let batches = [batch(0, 50), batch(1, 50), batch(2, 20)];

        assert!(tracker.record(&ack("b"), &batches[1]).await.is_none());
        assert!(tracker.record(&ack("c"), &batches[2]).await.is_none());
        let completion = tracker.record(&ack("a"), &batches[0]).await.unwrap();

        assert_eq!(completion.results.len(), 3);
        let total: usize = completion.results.values().map(Vec::len).sum();
        assert_eq!(total, 120);
        assert!(tracker.is_finalized().await);

        // late and duplicate arrivals are ignored
        assert!(tracker.record(&ack("a"), &batches[0]).await.is_none());
        assert!(tracker.record(&ack("z"), &batches[2]).await.is_none());
        assert_eq!(tracker.results().await.len(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_batch_is_counted_once() {
        let tracker = CompletionTracker::new(2, Instant::now());
        let first = batch(0, 2);
        assert!(tracker.record(&ack("a"), &first).await.is_none());
        assert!(tracker.record(&ack("a2"), &first).await.is_none());
        assert_eq!(tracker.acknowledged().await, 1);
        assert!(tracker.record(&ack("b"), &batch(1, 2)).await.is_some());
    }

    #[tokio::test]
    async fn test_key_collision_keeps_last_writer_and_still_completes() {
        let tracker = CompletionTracker::new(2, Instant::now());
        let first = batch(0, 2);
        let second = batch(1, 3);

        assert!(tracker.record(&ack("same"), &first).await.is_none());
        let completion = tracker.record(&ack("same"), &second).await.unwrap();

        assert_eq!(completion.results.len(), 1);
        assert_eq!(completion.results["same"], second.endpoints());
    }

    #[tokio::test]
    async fn test_concurrent_records() {
        let tracker = Arc::new(CompletionTracker::new(20, Instant::now()));
        let handles: Vec<_> = (0..20)
            .map(|i| {
                let tracker = Arc::clone(&tracker);
                tokio::spawn(async move {
                    tracker
                        .record(&ack(&format!("id-{}", i)), &batch(i, 5))
                        .await
                        .is_some()
                })
            })
            .collect();

        let mut completions = 0;
        for handle in handles {
            if handle.await.unwrap() {
                completions += 1;
            }
        }
        assert_eq!(completions, 1);
        assert_eq!(tracker.results().await.len(), 20);
    }
}
