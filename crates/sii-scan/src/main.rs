//! # sii-scan
//!
//! Scans a range of RUT bodies against the SII registry and stores every
//! record found.
//!
//! ## Usage
//! ```bash
//! # Scan with the configured range, resuming from the checkpoint
//! sii-scan
//!
//! # Scan a slice with 4 workers into a custom directory
//! sii-scan --start 5000000 --end 5100000 --workers 4 --output-dir out/
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use sii_client::SiiClient;
use sii_core::{AppConfig, TlsMode};
use sii_scan::{log_renewals, Checkpoint, OutputSink, Scanner};
use std::path::PathBuf;
use tracing::info;

/// Bulk taxpayer scan against the SII registry
#[derive(Parser, Debug)]
#[command(name = "sii-scan")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// First body to scan (overrides config)
    #[arg(long)]
    start: Option<u32>,

    /// End of the range, exclusive (overrides config)
    #[arg(long)]
    end: Option<u32>,

    /// Concurrent lookups (overrides config)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Output directory (overrides config)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Checkpoint file (overrides config)
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Skip TLS certificate verification
    #[arg(long)]
    permissive_tls: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    sii_scan::init_tracing();

    info!("Starting sii-scan v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => {
            let mut config = AppConfig::load_from(path)
                .with_context(|| format!("failed to load config {}", path.display()))?;
            config.apply_env();
            config
        }
        None => AppConfig::load_with_env().context("failed to load config")?,
    };

    if let Some(start) = args.start {
        config.scan.start = start;
    }
    if let Some(end) = args.end {
        config.scan.end = end;
    }
    if let Some(workers) = args.workers {
        config.scan.workers = workers;
    }
    if let Some(dir) = args.output_dir {
        config.scan.output_dir = dir;
    }
    if let Some(path) = args.checkpoint {
        config.scan.checkpoint_file = path;
    }
    if args.permissive_tls {
        config.client.tls.mode = TlsMode::Permissive;
    }
    config.client.validate().context("invalid client configuration")?;

    let checkpoint = Checkpoint::open(&config.scan.checkpoint_file)?;
    let start = checkpoint.resume_from(config.scan.start);
    let output = OutputSink::create(&config.scan.output_dir, config.scan.files_per_dir)?;

    let client = SiiClient::new(&config.client)
        .context("failed to build lookup client")?
        .on_new_credential(log_renewals());

    let scanner = Scanner::new(client, output, checkpoint, config.scan.workers);
    let summary = scanner.run(start..config.scan.end).await?;

    info!(
        "Scan complete: {} found, {} not found, {} failed",
        summary.found, summary.not_found, summary.failed
    );
    Ok(())
}
