//! Exposure key export service: materialises signed TEK archives on a
//! fixed cadence and publishes the index mobile clients poll.

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use time::OffsetDateTime;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tek_export_core::model::Exposure;
use tek_export_engine::memory::{
    MemoryExportConfigRepository, MemoryExportFileRepository, MemoryExposureRepository,
    MemoryLockService,
};
use tek_export_engine::signer::EcdsaSigner;
use tek_export_engine::store::FsBlobstore;
use tek_export_engine::worker::ExportWorker;

use crate::config::ExporterConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "TEK export service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs the export tick loop.
    Start {
        /// Path to the JSON configuration file.
        #[arg(long)]
        config: PathBuf,
    },
    /// Generates a new P-256 signing key and stores it.
    GenerateKey {
        /// Destination path for the raw key bytes.
        #[arg(long)]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Start { config } => start(&config).await,
        Commands::GenerateKey { out } => generate_key(&out),
    }
}

fn generate_key(out: &Path) -> Result<()> {
    let signer = EcdsaSigner::generate()?;
    signer.store_key_file(out)?;
    println!("New signing key stored at {}", out.display());
    Ok(())
}

async fn start(config_path: &Path) -> Result<()> {
    let config = ExporterConfig::from_file(config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(
            config.observability.level().as_str().to_lowercase(),
        ))
        .init();

    let signer = EcdsaSigner::from_key_file(&config.signing_key_path)?;
    let exposures = load_exposures(config.exposures_path.as_deref())?;
    info!(
        configs = config.configs.len(),
        exposures = exposures.len(),
        blobstore = %config.blobstore_root.display(),
        "exporter starting"
    );

    let worker = ExportWorker::new(
        config.exporter.clone(),
        Arc::new(MemoryExposureRepository::new(exposures)),
        Arc::new(MemoryExportConfigRepository::new(config.configs.clone())),
        Arc::new(MemoryExportFileRepository::default()),
        Arc::new(FsBlobstore::new(config.blobstore_root.clone())),
        Arc::new(signer),
        Arc::new(MemoryLockService::default()),
    );

    let mut ticker =
        tokio::time::interval(std::time::Duration::from_secs(config.tick_interval_secs));
    loop {
        ticker.tick().await;
        if let Err(err) = worker.export(OffsetDateTime::now_utc()).await {
            error!(error = %err, "export tick failed");
        }
    }
}

fn load_exposures(path: Option<&Path>) -> Result<Vec<Exposure>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read exposure seed file '{}'", path.display()))?;
    let exposures: Vec<Exposure> =
        serde_json::from_str(&content).context("Failed to parse exposure seed file")?;
    for exposure in &exposures {
        exposure
            .validate()
            .with_context(|| format!("Invalid seeded exposure in region {}", exposure.region))?;
    }
    Ok(exposures)
}
