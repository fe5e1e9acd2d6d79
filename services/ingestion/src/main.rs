use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ingestion::{IngestSummary, IngestionConfig, IngestionPipeline};
use serde::Serialize;
use store::FsBlobStore;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Bucket name used for local runs; the flat store ignores it.
const LOCAL_BUCKET: &str = "local";

#[derive(Parser, Debug)]
#[command(name = "ingestion", version, about = "Ingest RoK player snapshots")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest one local CSV/JSON file into a directory
    Local(LocalArgs),
    /// Replay an object-storage notification against a local store root
    Event(EventArgs),
}

#[derive(Args, Debug)]
struct LocalArgs {
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    kingdom: String,
    #[arg(long, help = "Snapshot date, YYYY-MM-DD")]
    dt: String,
    #[arg(long, default_value = "local_out")]
    out_dir: PathBuf,
}

#[derive(Args, Debug)]
struct EventArgs {
    #[arg(long)]
    event: PathBuf,
    #[arg(long, help = "Directory holding one subdirectory per bucket")]
    store_root: PathBuf,
}

#[derive(Serialize)]
struct LocalReport {
    #[serde(flatten)]
    summary: IngestSummary,
    raw_path: PathBuf,
    curated_path: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Local(args) => run_local(args),
        Commands::Event(args) => run_event(args),
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %format!("{err:#}"), "ingestion failed");
            ExitCode::FAILURE
        }
    }
}

fn run_local(args: LocalArgs) -> Result<()> {
    let store = FsBlobStore::flat(args.out_dir.clone());
    let pipeline = IngestionPipeline::new(store, IngestionConfig::from_env());
    let summary = pipeline
        .ingest_local_file(LOCAL_BUCKET, &args.input, &args.kingdom, &args.dt)
        .with_context(|| format!("ingesting {}", args.input.display()))?;

    let store = pipeline.store();
    let report = LocalReport {
        raw_path: store.object_path(LOCAL_BUCKET, &summary.raw_key)?,
        curated_path: store.object_path(LOCAL_BUCKET, &summary.curated_key)?,
        summary,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_event(args: EventArgs) -> Result<()> {
    let payload = std::fs::read(&args.event)
        .with_context(|| format!("reading event {}", args.event.display()))?;
    let pipeline = IngestionPipeline::new(
        FsBlobStore::new(args.store_root.clone()),
        IngestionConfig::from_env(),
    );
    let summaries = pipeline.handle_storage_event(&payload)?;
    println!("{}", serde_json::to_string_pretty(&summaries)?);
    Ok(())
}
