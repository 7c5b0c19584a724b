//! File-backed still camera
//!
//! Stands in for a hardware camera: each capture decodes the configured
//! image file into an RGBA frame on the capture worker thread.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use super::frame::{CapturedFrame, Rotation};
use super::worker::CaptureWorker;
use super::{CameraError, CaptureConfig, StillCamera};

/// Still camera backed by an image file
pub struct FileCamera {
    source: PathBuf,
    rotation: Rotation,
    worker: Arc<CaptureWorker>,
    bound: bool,
}

impl FileCamera {
    /// Create a new file-backed camera
    pub fn new(config: &CaptureConfig, worker: Arc<CaptureWorker>) -> Self {
        Self {
            source: config.source.clone(),
            rotation: config.rotation,
            worker,
            bound: false,
        }
    }

    async fn on_worker<T, F>(&self, job: F) -> Result<T, CameraError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.worker
            .run(job)
            .await
            .map_err(|_| CameraError::CaptureFailed("capture worker stopped".to_string()))
    }
}

#[async_trait]
impl StillCamera for FileCamera {
    async fn request_access(&self) -> Result<(), CameraError> {
        let source = self.source.clone();
        self.on_worker(move || match std::fs::metadata(&source) {
            Ok(metadata) if metadata.is_file() => Ok(()),
            Ok(_) => Err(CameraError::AccessDenied(format!(
                "{} is not a file",
                source.display()
            ))),
            Err(e) => Err(CameraError::AccessDenied(format!(
                "{}: {}",
                source.display(),
                e
            ))),
        })
        .await?
    }

    async fn bind(&mut self) -> Result<(), CameraError> {
        let source = self.source.clone();
        let (width, height) = self
            .on_worker(move || {
                image::image_dimensions(&source).map_err(|e| {
                    CameraError::CaptureFailed(format!("failed to probe {}: {}", source.display(), e))
                })
            })
            .await??;

        info!(
            "Camera session bound to {} ({}x{})",
            self.source.display(),
            width,
            height
        );
        self.bound = true;
        Ok(())
    }

    async fn capture_still(&mut self) -> Result<CapturedFrame, CameraError> {
        if !self.bound {
            return Err(CameraError::NotBound);
        }

        let source = self.source.clone();
        let rotation = self.rotation;
        let frame = self
            .on_worker(move || {
                let img = image::open(&source).map_err(|e| {
                    CameraError::CaptureFailed(format!(
                        "failed to decode {}: {}",
                        source.display(),
                        e
                    ))
                })?;
                let rgba = img.to_rgba8();
                let (width, height) = rgba.dimensions();
                Ok::<_, CameraError>(CapturedFrame::new(rgba.into_raw(), width, height, rotation))
            })
            .await??;

        debug!(
            "Captured {}x{} still (rotation {} degrees)",
            frame.width,
            frame.height,
            frame.rotation.degrees()
        );
        Ok(frame)
    }
}
