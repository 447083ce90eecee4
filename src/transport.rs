//! HTTP request layer used to fetch the listing page and submit batches

use crate::Result;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::{Client, RequestBuilder, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

/// Default timeout for HTTP requests in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default number of retries for transient statuses
const DEFAULT_RETRY_TIMES: usize = 3;

/// Default pause between retries in milliseconds
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Default user agent for HTTP requests
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Statuses treated as transient and retried
const DEFAULT_RETRY_STATUSES: [u16; 8] = [500, 502, 503, 504, 522, 524, 408, 429];

/// Request/response capability the pipeline runs on
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET a page and return its body
    async fn fetch(&self, url: &str) -> Result<String>;

    /// POST a form-encoded body and return the response body
    async fn submit_form(&self, url: &str, form: &[(&str, &str)]) -> Result<String>;
}

/// Configuration for the HTTP transport
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Timeout for each request
    pub timeout: Duration,
    /// User agent for HTTP requests
    pub user_agent: String,
    /// Extra attempts for transient statuses, timeouts and connect failures
    pub retry_times: usize,
    /// Statuses that trigger a retry
    pub retry_statuses: Vec<u16>,
    /// Pause between attempts
    pub retry_delay: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retry_times: DEFAULT_RETRY_TIMES,
            retry_statuses: DEFAULT_RETRY_STATUSES.to_vec(),
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

impl TransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn with_retry_times(mut self, retry_times: usize) -> Self {
        self.retry_times = retry_times;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    fn should_retry(&self, status: StatusCode) -> bool {
        self.retry_statuses.contains(&status.as_u16())
    }
}

/// `reqwest`-backed transport with browser-like headers and retries
#[derive(Debug, Clone)]
pub struct HttpTransport {
    config: TransportConfig,
    client: Client,
}

impl HttpTransport {
    /// Create a new transport with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(TransportConfig::default())
    }

    /// Create a new transport with custom configuration
    pub fn with_config(config: TransportConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en"));

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Send a request, retrying transient statuses and network faults, and
    /// return the body
    async fn send<F>(&self, url: &str, build: F) -> Result<String>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            let response = match build(&self.client).send().await {
                Ok(response) => response,
                Err(err) if is_transient(&err) && attempt < self.config.retry_times => {
                    attempt += 1;
                    warn!(url, error = %err, attempt, "Retrying request");
                    tokio::time::sleep(self.config.retry_delay).await;
                    continue;
                }
                Err(err) => {
                    return Err(err).with_context(|| format!("Request to {} failed", url));
                }
            };
            let status = response.status();

            if status.is_success() {
                debug!(url, %status, "Request succeeded");
                return response
                    .text()
                    .await
                    .with_context(|| format!("Failed to read response body from {}", url));
            }

            if self.config.should_retry(status) && attempt < self.config.retry_times {
                attempt += 1;
                warn!(url, %status, attempt, "Retrying request");
                tokio::time::sleep(self.config.retry_delay).await;
                continue;
            }

            return Err(anyhow!("HTTP status {} from {}", status, url));
        }
    }
}

/// Timeouts and failed connections are worth another attempt
fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.send(url, |client| client.get(url)).await
    }

    async fn submit_form(&self, url: &str, form: &[(&str, &str)]) -> Result<String> {
        self.send(url, |client| client.post(url).form(form)).await
    }
}
