//! Still Capture Layer
//!
//! Owns the camera session: a permission gate, a lifecycle bind, and
//! single-shot still capture. Blocking device work runs on a dedicated
//! single-thread worker that is torn down when the session ends.

pub mod file_camera;
pub mod frame;
pub mod worker;

pub use file_camera::FileCamera;
pub use frame::{CapturedFrame, Rotation};
pub use worker::CaptureWorker;

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from the camera collaborator
#[derive(Debug, Error)]
pub enum CameraError {
    /// Access to the capture source was denied or the source is missing
    #[error("camera access denied: {0}")]
    AccessDenied(String),
    /// Capture was requested before the session was bound
    #[error("camera session not bound")]
    NotBound,
    /// The hardware (or its stand-in) failed to produce a frame
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Capture configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Path of the still source standing in for the camera device
    pub source: PathBuf,
    /// Rotation correction reported with each frame
    pub rotation: Rotation,
}

/// A camera-like source able to produce one still frame per request
#[async_trait]
pub trait StillCamera: Send + Sync {
    /// Request access to the underlying device; called once per cold start.
    /// Denial is terminal for the whole flow.
    async fn request_access(&self) -> Result<(), CameraError>;

    /// Bind the capture session
    async fn bind(&mut self) -> Result<(), CameraError>;

    /// Capture exactly one still frame
    async fn capture_still(&mut self) -> Result<CapturedFrame, CameraError>;
}
