//! Text Recognition Layer
//!
//! Converts exactly one captured frame into recognized text. Two backends:
//! - ocrs (pure Rust, models auto-downloaded on first use)
//! - system tesseract via rusty-tesseract

pub mod models;
pub mod ocrs_engine;
pub mod preprocess;
pub mod tesseract;

pub use models::{ModelManager, ModelType};
pub use ocrs_engine::OcrsRecognizer;
pub use tesseract::TesseractRecognizer;

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

use crate::capture::CapturedFrame;

/// Recognition backend selection
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum RecognizerBackend {
    /// Pure-Rust ocrs engine (recommended; models auto-downloaded)
    #[default]
    Ocrs,
    /// System tesseract binary
    Tesseract,
}

/// Recognition errors
#[derive(Debug, Error)]
pub enum RecognitionError {
    /// The backend's models or binary could not be made available
    #[error("recognition backend unavailable: {0}")]
    ModelUnavailable(String),
    /// Text extraction itself failed
    #[error("text recognition failed: {0}")]
    Failed(String),
}

/// Configuration for the recognition layer
#[derive(Debug, Clone)]
pub struct RecognitionConfig {
    /// Backend to use
    pub backend: RecognizerBackend,
    /// Override for the model cache directory
    pub models_dir: Option<PathBuf>,
    /// Upscale small captures before recognition
    pub upscale_small: bool,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            backend: RecognizerBackend::default(),
            models_dir: None,
            upscale_small: true,
        }
    }
}

/// Text recognized from a single frame
#[derive(Debug, Clone)]
pub struct RecognizedText {
    /// The full recognized text
    pub text: String,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

/// A collaborator able to turn one captured frame into text
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Prepare the backend; downloads models when they are absent
    async fn ensure_ready(&self) -> Result<(), RecognitionError>;

    /// Recognize text in the frame, consuming it
    async fn recognize(&self, frame: CapturedFrame) -> Result<RecognizedText, RecognitionError>;
}

/// Build the recognizer for the configured backend
pub fn build_recognizer(
    config: &RecognitionConfig,
) -> Result<Box<dyn TextRecognizer>, RecognitionError> {
    match config.backend {
        RecognizerBackend::Ocrs => Ok(Box::new(OcrsRecognizer::new(config)?)),
        RecognizerBackend::Tesseract => Ok(Box::new(TesseractRecognizer::new(config))),
    }
}
