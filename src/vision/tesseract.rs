//! Tesseract recognition backend
//!
//! Uses the system tesseract binary through rusty-tesseract. No model
//! download is needed; `ensure_ready` only probes that the binary exists.

use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Command;
use std::time::Instant;
use tracing::debug;

use super::preprocess;
use super::{RecognitionConfig, RecognitionError, RecognizedText, TextRecognizer};
use crate::capture::CapturedFrame;

/// Text recognizer backed by the system tesseract binary
pub struct TesseractRecognizer {
    language: String,
    upscale_small: bool,
}

impl TesseractRecognizer {
    /// Create a new tesseract recognizer
    pub fn new(config: &RecognitionConfig) -> Self {
        Self {
            language: "eng".to_string(),
            upscale_small: config.upscale_small,
        }
    }
}

#[async_trait]
impl TextRecognizer for TesseractRecognizer {
    async fn ensure_ready(&self) -> Result<(), RecognitionError> {
        tokio::task::spawn_blocking(probe_binary)
            .await
            .map_err(|e| RecognitionError::Failed(format!("probe task failed: {}", e)))?
    }

    async fn recognize(&self, frame: CapturedFrame) -> Result<RecognizedText, RecognitionError> {
        let start = Instant::now();
        let language = self.language.clone();
        let upscale_small = self.upscale_small;

        let text =
            tokio::task::spawn_blocking(move || run_tesseract(&language, frame, upscale_small))
                .await
                .map_err(|e| RecognitionError::Failed(format!("recognition task failed: {}", e)))??;

        let processing_time_ms = start.elapsed().as_millis() as u64;
        debug!(
            "tesseract recognition complete in {}ms: {} chars",
            processing_time_ms,
            text.len()
        );

        Ok(RecognizedText {
            text,
            processing_time_ms,
        })
    }
}

/// Check that the tesseract binary is on PATH
fn probe_binary() -> Result<(), RecognitionError> {
    match Command::new("tesseract").arg("--version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(output) => Err(RecognitionError::ModelUnavailable(format!(
            "tesseract --version failed: {}",
            String::from_utf8_lossy(&output.stderr)
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
            RecognitionError::ModelUnavailable(
                "tesseract not found (install tesseract-ocr)".to_string(),
            ),
        ),
        Err(e) => Err(RecognitionError::Failed(e.to_string())),
    }
}

/// Blocking recognition body
fn run_tesseract(
    language: &str,
    frame: CapturedFrame,
    upscale_small: bool,
) -> Result<String, RecognitionError> {
    let img = preprocess::frame_to_image(frame).ok_or_else(|| {
        RecognitionError::Failed("frame buffer does not match its dimensions".to_string())
    })?;
    let img = if upscale_small {
        preprocess::upscale_small(img)
    } else {
        img
    };

    let tess_img = rusty_tesseract::Image::from_dynamic_image(&img)
        .map_err(|e| RecognitionError::Failed(format!("failed to convert frame: {}", e)))?;

    let args = rusty_tesseract::Args {
        lang: language.to_string(),
        config_variables: HashMap::new(),
        dpi: Some(150),
        psm: Some(3), // Fully automatic page segmentation
        oem: Some(3), // Default engine mode
    };

    let text = rusty_tesseract::image_to_string(&tess_img, &args)
        .map_err(|e| RecognitionError::Failed(format!("text extraction failed: {}", e)))?;

    Ok(text.trim_end().to_string())
}
