//! # kbload: batch uploads into knowledge bases
//!
//! This is the main entry point for the `kbload` command-line interface.

mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use kbload::{BatchUploader, RemoteService, ServiceKind, UploaderConfig};
use kbload_ragflow::{DatasetRequest, RagflowService};
use kbload_webui::WebUiService;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, error, info};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// --- CLI Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the campaign configuration file (defaults to ./kbload.yml)
    #[arg(long, short, global = true, env = "KBLOAD_CONFIG_FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload the source directory and register every uploaded file
    Upload,
    /// Register already uploaded files that are not completed yet
    Register,
    /// Show the progress recorded in the campaign ledgers
    Status {
        /// Print the ledger summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a RAGFlow dataset and print its id
    CreateDataset(CreateDatasetArgs),
}

#[derive(Parser, Debug)]
struct CreateDatasetArgs {
    /// The name of the dataset to create
    #[arg(long, required = true)]
    name: String,
    #[arg(long)]
    description: Option<String>,
    /// The embedding model, e.g. `BAAI/bge-large-zh-v1.5@BAAI`
    #[arg(long)]
    embedding_model: Option<String>,
    /// The chunking method, e.g. `naive`
    #[arg(long)]
    chunk_method: Option<String>,
}

impl Commands {
    fn label(&self) -> &'static str {
        match self {
            Commands::Upload => "Upload",
            Commands::Register => "Register",
            Commands::Status { .. } => "Status",
            Commands::CreateDataset(_) => "Dataset creation",
        }
    }
}

// --- Main Application Entry ---

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let app_config = match config::get_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{} failed: {e:#}", cli.command.label());
            std::process::exit(1);
        }
    };
    init_tracing(&app_config.log_file)?;

    let result = match &cli.command {
        Commands::Upload => handle_upload(app_config).await,
        Commands::Register => handle_register(app_config).await,
        Commands::Status { json } => handle_status(app_config, *json),
        Commands::CreateDataset(args) => handle_create_dataset(app_config, args).await,
    };

    if let Err(e) = result {
        error!("{e:#}");
        eprintln!("{} failed: {e:#}", cli.command.label());
        std::process::exit(1);
    }
    Ok(())
}

/// Logs to the console and appends to the campaign log file, each line prefixed
/// with a local timestamp. `RUST_LOG` overrides the default `info` level.
fn init_tracing(log_file: &Path) -> Result<()> {
    if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("Failed to open log file '{}'", log_file.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_timer(ChronoLocal::new(LOG_TIMESTAMP_FORMAT.to_string())),
        )
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_timer(ChronoLocal::new(LOG_TIMESTAMP_FORMAT.to_string()))
                .with_writer(Mutex::new(file)),
        )
        .try_init()?;
    Ok(())
}

fn build_service(config: &UploaderConfig) -> Result<Box<dyn RemoteService>> {
    let service: Box<dyn RemoteService> = match config.service {
        ServiceKind::Webui => Box::new(WebUiService::new(config)?),
        ServiceKind::Ragflow => Box::new(RagflowService::new(config)?),
    };
    Ok(service)
}

// --- Command Handlers ---

async fn handle_upload(config: UploaderConfig) -> Result<()> {
    info!(
        "Starting {} campaign for '{}' from '{}'",
        config.service,
        config.target_label(),
        config.source_dir.display()
    );
    let service = build_service(&config)?;
    let mut uploader = BatchUploader::new(config, service)?;
    let report = uploader.run().await?;
    debug!(report = %serde_json::to_string(&report)?, "Campaign report");

    if report.nothing_to_do {
        println!("✅ Nothing to upload; every file in the work set was already uploaded.");
    } else {
        println!(
            "✅ Uploaded {} files, registered {} ({} duplicates), {} errored, {} skipped.",
            report.uploaded,
            report.registered + report.duplicates,
            report.duplicates,
            report.errored,
            report.transient
        );
    }
    Ok(())
}

async fn handle_register(config: UploaderConfig) -> Result<()> {
    let service = build_service(&config)?;
    let mut uploader = BatchUploader::new(config, service)?;
    let report = uploader.register_pending().await?;

    println!(
        "✅ Registered {} files ({} duplicates), {} errored.",
        report.registered + report.duplicates,
        report.duplicates,
        report.errored
    );
    Ok(())
}

fn handle_status(config: UploaderConfig, json: bool) -> Result<()> {
    let ledger = kbload::ProgressLedger::open(&config.ledger)?;
    let summary = ledger.summary();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Campaign: {} → '{}'", config.service, config.target_label());
    println!("  Work set:              {}", summary.work_set);
    println!("  Uploaded:              {}", summary.uploaded);
    println!("  Completed:             {}", summary.completed);
    println!("  Errored:               {}", summary.errored);
    println!("  Remaining uploads:     {}", summary.remaining_uploads);
    println!("  Pending registrations: {}", summary.pending_registrations);
    Ok(())
}

async fn handle_create_dataset(config: UploaderConfig, args: &CreateDatasetArgs) -> Result<()> {
    if config.service != ServiceKind::Ragflow {
        bail!(
            "create-dataset requires the ragflow service, but the configuration targets {}",
            config.service
        );
    }

    let mut request = DatasetRequest::new(&args.name);
    if let Some(description) = &args.description {
        request.description = description.clone();
    }
    if let Some(model) = &args.embedding_model {
        request.embedding_model = model.clone();
    }
    if let Some(method) = &args.chunk_method {
        request.chunk_method = method.clone();
    }

    let service = RagflowService::new(&config)?;
    let dataset_id = service.create_dataset(&request).await?;
    println!("✅ Created dataset '{}' with id: {dataset_id}", args.name);
    Ok(())
}
