//! entity-lens - capture a photo, recognize its text, extract entities
//!
//! A small scanner pipeline: one still capture from a camera-like source,
//! on-device text recognition, then entity extraction over the recognized
//! text, ending in a results list.

mod capture;
mod config;
mod extract;
mod pipeline;
mod present;
mod vision;

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::capture::{CaptureConfig, CaptureWorker, FileCamera, Rotation};
use crate::config::AppConfig;
use crate::extract::{EntityKind, PatternAnnotator};
use crate::pipeline::ScanPipeline;
use crate::present::{OutputFormat, SpinnerFeedback};
use crate::vision::{ModelManager, RecognitionConfig};

/// entity-lens - still-photo entity scanner
#[derive(Parser, Debug)]
#[command(name = "entity-lens")]
#[command(about = "Capture a photo, recognize its text, and list the entities found")]
struct Args {
    /// Image file standing in for the camera source
    source: Option<PathBuf>,

    /// Recognition backend to use
    #[arg(long, value_enum)]
    backend: Option<vision::RecognizerBackend>,

    /// Rotation correction in degrees (0, 90, 180 or 270)
    #[arg(long)]
    rotation: Option<u32>,

    /// Directory holding the recognition models
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Output format for the results list
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// List supported entity kinds and exit
    #[arg(long)]
    list_kinds: bool,

    /// Show recognition model status and exit
    #[arg(long)]
    model_status: bool,

    /// Path to a config file (defaults to the user config dir)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; RUST_LOG overrides the default level
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    // List kinds mode
    if args.list_kinds {
        println!("Supported entity kinds:");
        for kind in EntityKind::ALL {
            println!("  [{:2}] {}", kind.code(), kind.label());
        }
        return Ok(());
    }

    let config = load_or_create_config(args.config.as_deref());

    // Model status mode
    if args.model_status {
        return print_model_status(args.models_dir.clone().or(config.recognition.models_dir.clone()));
    }

    let Some(source) = args.source.clone().or(config.capture.source.clone()) else {
        anyhow::bail!("no image source given (pass a path, or set capture.source in the config)");
    };

    let rotation = match args.rotation {
        Some(degrees) => Rotation::from_degrees(degrees)
            .with_context(|| format!("invalid rotation {} (expected 0, 90, 180 or 270)", degrees))?,
        None => config.capture.rotation,
    };

    info!("entity-lens starting");
    info!("Source: {} (rotation {} degrees)", source.display(), rotation.degrees());

    // Assemble the capture session
    let worker = Arc::new(CaptureWorker::spawn());
    let camera = FileCamera::new(
        &CaptureConfig { source, rotation },
        worker.clone(),
    );

    let recognition_config = RecognitionConfig {
        backend: args.backend.unwrap_or(config.recognition.backend),
        models_dir: args.models_dir.clone().or(config.recognition.models_dir.clone()),
        upscale_small: config.recognition.upscale_small,
    };
    let recognizer = vision::build_recognizer(&recognition_config)
        .context("failed to set up the recognition backend")?;

    let annotator = if config.extraction.kinds.is_empty() {
        PatternAnnotator::new()
    } else {
        PatternAnnotator::with_kinds(config.extraction.kinds.clone())
    };

    let feedback = Arc::new(SpinnerFeedback::new());
    let cancel = CancellationToken::new();

    // Tear the pipeline down on Ctrl-C; late completions become no-ops
    let teardown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            teardown.cancel();
        }
    });

    let mut scan = ScanPipeline::new(
        Box::new(camera),
        recognizer,
        Box::new(annotator),
        feedback,
        cancel,
    );

    if scan.open().await.is_err() {
        // The pipeline already reported the failure
        anyhow::bail!("scan did not complete");
    }

    match scan.run().await {
        Some(items) => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            present::render(&items, args.format, &mut out).context("failed to render results")?;
            out.flush().ok();
            Ok(())
        }
        None => anyhow::bail!("scan did not complete"),
    }
}

/// Load configuration from file or fall back to defaults
fn load_or_create_config(path: Option<&std::path::Path>) -> AppConfig {
    if let Some(path) = path {
        match config::load_config(path) {
            Ok(config) => {
                info!("Loaded configuration from {}", path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {}", path.display(), e);
                return AppConfig::default();
            }
        }
    }

    if let Ok(config_dir) = config::config_dir() {
        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            if let Ok(config) = config::load_config(&config_path) {
                info!("Loaded configuration from {}", config_path.display());
                return config;
            }
        }
    }

    info!("Using default configuration");
    AppConfig::default()
}

/// Print the on-disk status of the recognition models
fn print_model_status(models_dir: Option<PathBuf>) -> Result<()> {
    let manager = match models_dir {
        Some(dir) => ModelManager::with_dir(dir)?,
        None => ModelManager::new()?,
    };

    println!("Model directory: {}", manager.models_dir().display());
    for (model_type, available, size) in manager.get_model_status() {
        let status = if available {
            match size {
                Some(bytes) => format!("downloaded ({} bytes)", bytes),
                None => "downloaded".to_string(),
            }
        } else {
            "missing".to_string()
        };
        println!("  {:18} {}", model_type.display_name(), status);
    }

    Ok(())
}
