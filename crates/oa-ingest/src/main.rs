//! oa-ingest - OpenAddresses source acquisition tool

use anyhow::{Context, Result};
use clap::Parser;
use oa_common::logging::{init_logging, LogConfig, LogLevel};
use oa_common::{CacheRecord, Fingerprint};
use oa_ingest::{cache_source, extension, IngestConfig, IngestContext};
use std::path::PathBuf;
use tracing::info;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "oa-ingest")]
#[command(author, version, about = "OpenAddresses source acquisition tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Download a source and store it in the cache
    Cache {
        /// Source definition JSON file
        source: PathBuf,

        /// Destination directory for scratch space and the result store
        #[arg(short, long, default_value = "./out")]
        dest: PathBuf,

        /// Cache reference recorded by a previous run
        #[arg(long, requires = "prior_fingerprint")]
        prior_cache: Option<Url>,

        /// Fingerprint recorded by a previous run
        #[arg(long, requires = "prior_cache")]
        prior_fingerprint: Option<String>,
    },

    /// Print the file extension a URL resolves to
    Extension {
        url: String,
    },

    /// Print the fingerprint of a local file
    Fingerprint {
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Environment first; --verbose only ever raises the level
    let mut log_config = LogConfig::from_env().unwrap_or_else(|_| {
        LogConfig::builder()
            .level(LogLevel::Info)
            .log_file_prefix("oa-ingest")
            .build()
    });
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    let _guard = init_logging(&log_config)?;

    match cli.command {
        Command::Cache {
            source,
            dest,
            prior_cache,
            prior_fingerprint,
        } => {
            let ctx = IngestContext::new(IngestConfig::from_env()?)?;
            let prior = match (prior_cache, prior_fingerprint) {
                (Some(cache), Some(fingerprint)) => Some(CacheRecord::new(cache, fingerprint, None)),
                _ => None,
            };

            info!(source = %source.display(), dest = %dest.display(), "Caching source");
            let result = cache_source(&ctx, &source, &dest, prior)
                .await
                .with_context(|| format!("Failed to cache {}", source.display()))?;

            println!("{}", serde_json::to_string_pretty(&result)?);
        },
        Command::Extension { url } => {
            let ctx = IngestContext::new(IngestConfig::from_env()?)?;
            let url = oa_ingest::fetch::parse_source_url(&url)?;
            let ext = extension::resolve(&ctx, &url).await?;
            println!("{}", ext.unwrap_or_default());
        },
        Command::Fingerprint { file } => {
            let fingerprint = Fingerprint::from_file(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            println!("{}", fingerprint);
        },
    }

    Ok(())
}
