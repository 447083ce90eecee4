use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use proxy_harvest::{
    config::{
        Credential, HarvestConfig, DEFAULT_CONCURRENCY, DEFAULT_MAX_ROWS, DEFAULT_SOURCE_URL,
        DEFAULT_UPLOAD_URL,
    },
    logging,
    proxy::{AddressPolicy, RecordExtractor, DEFAULT_BATCH_CAPACITY},
    transport::TransportConfig,
    Pipeline,
};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Harvest public proxy listings and redistribute them in batches
#[derive(Parser)]
#[command(name = "proxy-harvest")]
#[command(about = "Harvest public proxy listings and redistribute them in batches")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Default log level (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape the listing, upload every batch and write the results
    Run {
        /// Personal token (defaults to PERSONAL_TOKEN)
        #[arg(short, long)]
        token: Option<String>,
        /// Listing page to scrape
        #[arg(long, default_value = DEFAULT_SOURCE_URL)]
        source_url: String,
        /// Collection endpoint to upload batches to
        #[arg(long, default_value = DEFAULT_UPLOAD_URL)]
        upload_url: String,
        /// Proxies per uploaded batch
        #[arg(short, long, default_value_t = NonZeroUsize::new(DEFAULT_BATCH_CAPACITY).unwrap_or(NonZeroUsize::MIN))]
        batch_size: NonZeroUsize,
        /// Maximum listing rows to read (0 for no limit)
        #[arg(long, default_value_t = DEFAULT_MAX_ROWS)]
        max_rows: usize,
        /// Only accept dotted-quad IPv4 addresses
        #[arg(long)]
        strict: bool,
        /// Number of concurrent batch submissions
        #[arg(short = 'n', long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,
        /// Timeout in seconds for HTTP requests
        #[arg(long, default_value = "60")]
        timeout: u64,
        /// Retries for transient HTTP statuses
        #[arg(long, default_value = "3")]
        retries: usize,
        /// Directory for proxies.json, results.json and time.txt
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Extract proxies from a saved listing page without uploading
    Extract {
        /// HTML file containing the listing table
        input: PathBuf,
        /// Output file for the extracted proxies (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Maximum listing rows to read (0 for no limit)
        #[arg(long, default_value_t = DEFAULT_MAX_ROWS)]
        max_rows: usize,
        /// Only accept dotted-quad IPv4 addresses
        #[arg(long)]
        strict: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_json);

    match cli.command {
        Commands::Run {
            token,
            source_url,
            upload_url,
            batch_size,
            max_rows,
            strict,
            concurrency,
            timeout,
            retries,
            output_dir,
        } => {
            let credential = Credential::resolve(token)?;

            let transport_config = TransportConfig::new()
                .with_timeout(Duration::from_secs(timeout))
                .with_retry_times(retries);
            let config = HarvestConfig::new()
                .with_source_url(source_url)
                .with_upload_url(upload_url)
                .with_batch_capacity(batch_size)
                .with_max_rows(row_limit(max_rows))
                .with_address_policy(address_policy(strict))
                .with_concurrency(concurrency)
                .with_output_dir(output_dir)
                .with_transport(transport_config);
            let pipeline = Pipeline::from_config(config, credential)?;

            let summary = pipeline.run().await?;
            if !summary.is_finalized() {
                bail!(
                    "Upload incomplete: {} of {} batches acknowledged",
                    summary.acknowledged,
                    summary.batches
                );
            }
            info!(
                proxies = summary.records,
                batches = summary.batches,
                elapsed = summary.elapsed.as_deref().unwrap_or_default(),
                "Done"
            );
        }
        Commands::Extract {
            input,
            output,
            max_rows,
            strict,
        } => {
            let html = std::fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {:?}", input))?;
            let page = RecordExtractor::new()
                .with_policy(address_policy(strict))
                .with_max_rows(row_limit(max_rows))
                .extract_page(&html)?;

            info!(
                rows = page.rows_seen,
                proxies = page.records.len(),
                "Extracted proxies from {:?}",
                input
            );
            if page.records.len() < page.rows_seen {
                warn!(skipped = page.rows_seen - page.records.len(), "Some rows were skipped");
            }

            let json = serde_json::to_string_pretty(&page.records)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write {:?}", path))?;
                    info!("Saved extracted proxies to {:?}", path);
                }
                None => println!("{}", json),
            }
        }
    }

    Ok(())
}

fn row_limit(max_rows: usize) -> Option<usize> {
    (max_rows > 0).then_some(max_rows)
}

fn address_policy(strict: bool) -> AddressPolicy {
    if strict {
        AddressPolicy::DottedQuad
    } else {
        AddressPolicy::Any
    }
}
