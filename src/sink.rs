//! Output artifacts written by a harvest run

use crate::proxy::models::{ProxyRecord, ResultMap};
use crate::Result;
use anyhow::Context;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Scraped records, written after extraction
pub const PROXIES_FILE: &str = "proxies.json";

/// Acknowledgement id → endpoints map, written at finalization
pub const RESULTS_FILE: &str = "results.json";

/// Run duration as `HH:MM:SS`, written at finalization
pub const TIME_FILE: &str = "time.txt";

/// Destination for the run's output artifacts.
///
/// Each method writes one artifact; callers log failures and carry on.
pub trait ArtifactSink: Send + Sync {
    fn write_records(&self, records: &[ProxyRecord]) -> Result<()>;

    fn write_results(&self, results: &ResultMap) -> Result<()>;

    fn write_elapsed(&self, elapsed: &str) -> Result<()>;
}

/// Writes artifacts as files in one directory
#[derive(Debug, Clone)]
pub struct FsSink {
    dir: PathBuf,
}

impl FsSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.path(name);
        let content = serde_json::to_string_pretty(value)
            .with_context(|| format!("Failed to serialize {}", name))?;
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

impl ArtifactSink for FsSink {
    fn write_records(&self, records: &[ProxyRecord]) -> Result<()> {
        self.write_json(PROXIES_FILE, records)?;
        info!(count = records.len(), file = PROXIES_FILE, "Saved proxies");
        Ok(())
    }

    fn write_results(&self, results: &ResultMap) -> Result<()> {
        self.write_json(RESULTS_FILE, results)?;
        info!(entries = results.len(), file = RESULTS_FILE, "Saved upload results");
        Ok(())
    }

    fn write_elapsed(&self, elapsed: &str) -> Result<()> {
        let path = self.path(TIME_FILE);
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        fs::write(&path, elapsed).with_context(|| format!("Failed to write {}", path.display()))?;
        info!(elapsed, file = TIME_FILE, "Saved execution time");
        Ok(())
    }
}
