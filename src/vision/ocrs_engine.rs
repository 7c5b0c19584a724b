//! ocrs recognition backend
//!
//! Pure-Rust OCR via the ocrs crate. The `.rten` model pair is fetched
//! through the [`ModelManager`] behind `ensure_ready`; inference runs on a
//! blocking task so the pipeline stays async.

use async_trait::async_trait;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{debug, info};

use super::models::{ModelManager, ModelType};
use super::preprocess;
use super::{RecognitionConfig, RecognitionError, RecognizedText, TextRecognizer};
use crate::capture::CapturedFrame;

/// Cached engine instance; model loading happens once per process.
/// ocrs engine methods take &self, so no lock is needed around calls.
static ENGINE: OnceLock<ocrs::OcrEngine> = OnceLock::new();

/// Text recognizer backed by the ocrs engine
pub struct OcrsRecognizer {
    manager: ModelManager,
    upscale_small: bool,
}

impl OcrsRecognizer {
    /// Create a new ocrs recognizer
    pub fn new(config: &RecognitionConfig) -> Result<Self, RecognitionError> {
        let manager = match &config.models_dir {
            Some(dir) => ModelManager::with_dir(dir.clone()),
            None => ModelManager::new(),
        }
        .map_err(|e| RecognitionError::ModelUnavailable(e.to_string()))?;

        Ok(Self {
            manager,
            upscale_small: config.upscale_small,
        })
    }
}

#[async_trait]
impl TextRecognizer for OcrsRecognizer {
    async fn ensure_ready(&self) -> Result<(), RecognitionError> {
        self.manager
            .ensure_all_models()
            .await
            .map_err(|e| RecognitionError::ModelUnavailable(format!("{:#}", e)))?;
        Ok(())
    }

    async fn recognize(&self, frame: CapturedFrame) -> Result<RecognizedText, RecognitionError> {
        let start = Instant::now();
        let detection_path = self.manager.model_path(ModelType::Detection);
        let recognition_path = self.manager.model_path(ModelType::Recognition);
        let upscale_small = self.upscale_small;

        let text = tokio::task::spawn_blocking(move || {
            run_ocrs(&detection_path, &recognition_path, frame, upscale_small)
        })
        .await
        .map_err(|e| RecognitionError::Failed(format!("recognition task failed: {}", e)))??;

        let processing_time_ms = start.elapsed().as_millis() as u64;
        debug!(
            "ocrs recognition complete in {}ms: {} chars",
            processing_time_ms,
            text.len()
        );

        Ok(RecognizedText {
            text,
            processing_time_ms,
        })
    }
}

/// Get or initialize the cached engine
fn engine_for(
    detection_path: &Path,
    recognition_path: &Path,
) -> Result<&'static ocrs::OcrEngine, RecognitionError> {
    if let Some(engine) = ENGINE.get() {
        return Ok(engine);
    }

    info!("Loading recognition models from {:?}", detection_path.parent());

    let detection_model = rten::Model::load_file(detection_path).map_err(|e| {
        RecognitionError::ModelUnavailable(format!("failed to load detection model: {}", e))
    })?;
    let recognition_model = rten::Model::load_file(recognition_path).map_err(|e| {
        RecognitionError::ModelUnavailable(format!("failed to load recognition model: {}", e))
    })?;

    let engine = ocrs::OcrEngine::new(ocrs::OcrEngineParams {
        detection_model: Some(detection_model),
        recognition_model: Some(recognition_model),
        ..Default::default()
    })
    .map_err(|e| RecognitionError::Failed(format!("failed to create engine: {}", e)))?;

    // If another thread won the race, use its engine
    let _ = ENGINE.set(engine);
    ENGINE
        .get()
        .ok_or_else(|| RecognitionError::Failed("failed to cache engine".to_string()))
}

/// Blocking recognition body
fn run_ocrs(
    detection_path: &Path,
    recognition_path: &Path,
    frame: CapturedFrame,
    upscale_small: bool,
) -> Result<String, RecognitionError> {
    let engine = engine_for(detection_path, recognition_path)?;

    let img = preprocess::frame_to_image(frame).ok_or_else(|| {
        RecognitionError::Failed("frame buffer does not match its dimensions".to_string())
    })?;
    let img = if upscale_small {
        preprocess::upscale_small(img)
    } else {
        img
    };

    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    let source = ocrs::ImageSource::from_bytes(rgb.as_raw(), (width, height))
        .map_err(|e| RecognitionError::Failed(format!("failed to convert frame: {}", e)))?;

    let input = engine
        .prepare_input(source)
        .map_err(|e| RecognitionError::Failed(format!("failed to prepare input: {}", e)))?;

    let text = engine
        .get_text(&input)
        .map_err(|e| RecognitionError::Failed(format!("text extraction failed: {}", e)))?;

    Ok(text.trim_end().to_string())
}
