//! Harvest configuration and credential resolution

use crate::error::HarvestError;
use crate::proxy::batcher::DEFAULT_BATCH_CAPACITY;
use crate::proxy::extractor::AddressPolicy;
use crate::transport::TransportConfig;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;

/// Listing page the proxies are scraped from
pub const DEFAULT_SOURCE_URL: &str = "https://advanced.name/freeproxy";

/// Collection endpoint batches are submitted to
pub const DEFAULT_UPLOAD_URL: &str = "https://test-rg8.ddns.net";

/// Only the first rows of the listing table are considered
pub const DEFAULT_MAX_ROWS: usize = 150;

/// Default number of in-flight batch submissions
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Environment variable holding the personal token
pub const TOKEN_ENV_VAR: &str = "PERSONAL_TOKEN";

/// Placeholder shipped in `.env.example`; never a real token
const TOKEN_PLACEHOLDER: &str = "your_personal_token_here";

/// Configuration for one harvest run
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Listing page URL
    pub source_url: String,
    /// Upload endpoint URL
    pub upload_url: String,
    /// Maximum records per submitted batch
    pub batch_capacity: NonZeroUsize,
    /// Row limit applied to the listing table
    pub max_rows: Option<usize>,
    /// Address validation policy
    pub address_policy: AddressPolicy,
    /// Maximum concurrent batch submissions
    pub concurrency: usize,
    /// Directory receiving the output artifacts
    pub output_dir: PathBuf,
    /// Request layer settings
    pub transport: TransportConfig,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
            batch_capacity: NonZeroUsize::new(DEFAULT_BATCH_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            max_rows: Some(DEFAULT_MAX_ROWS),
            address_policy: AddressPolicy::Any,
            concurrency: DEFAULT_CONCURRENCY,
            output_dir: PathBuf::from("."),
            transport: TransportConfig::default(),
        }
    }
}

impl HarvestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }

    pub fn with_upload_url(mut self, url: impl Into<String>) -> Self {
        self.upload_url = url.into();
        self
    }

    pub fn with_batch_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.batch_capacity = capacity;
        self
    }

    pub fn with_max_rows(mut self, max_rows: Option<usize>) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn with_address_policy(mut self, policy: AddressPolicy) -> Self {
        self.address_policy = policy;
        self
    }

    /// Set the submission concurrency; zero is raised to one
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }
}

/// Personal token sent with every batch submission
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Resolve the token from an explicit override or `PERSONAL_TOKEN`
    pub fn resolve(token: Option<String>) -> std::result::Result<Self, HarvestError> {
        Self::resolve_with(token, std::env::var(TOKEN_ENV_VAR).ok())
    }

    /// Resolve from an override and an already-read environment value.
    ///
    /// The override wins. Blank values and the template placeholder count
    /// as absent.
    pub fn resolve_with(
        token: Option<String>,
        env_value: Option<String>,
    ) -> std::result::Result<Self, HarvestError> {
        token
            .into_iter()
            .chain(env_value)
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty() && value != TOKEN_PLACEHOLDER)
            .map(Self)
            .ok_or(HarvestError::MissingCredential)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Token with its middle starred, safe for logs
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 8 {
            return "*".repeat(chars.len());
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}{}{}", head, "*".repeat(chars.len() - 8), tail)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.masked()).finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.masked())
    }
}
