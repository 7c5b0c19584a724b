//! Model management for the pure-Rust recognition backend
//!
//! Handles downloading, caching, and integrity-checking of the ocrs
//! `.rten` model pair.

use anyhow::{Context, Result};
use futures_util::StreamExt;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Model identifier for the recognition components
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    /// Text detection model
    Detection,
    /// Text recognition model
    Recognition,
}

impl ModelType {
    /// Get the filename for this model type
    pub fn filename(&self) -> &'static str {
        match self {
            ModelType::Detection => "text-detection.rten",
            ModelType::Recognition => "text-recognition.rten",
        }
    }

    /// Get the download URL for this model
    pub fn download_url(&self) -> &'static str {
        match self {
            ModelType::Detection => {
                "https://ocrs-models.s3-accelerate.amazonaws.com/text-detection.rten"
            }
            ModelType::Recognition => {
                "https://ocrs-models.s3-accelerate.amazonaws.com/text-recognition.rten"
            }
        }
    }

    /// Expected file size for integrity check (approximate, in bytes)
    pub fn expected_size_range(&self) -> (u64, u64) {
        match self {
            ModelType::Detection => (1_000_000, 8_000_000), // ~2.5 MB
            ModelType::Recognition => (5_000_000, 20_000_000), // ~10 MB
        }
    }

    /// Get expected SHA256 checksum for model verification (optional)
    ///
    /// Returns None if the checksum is not pinned.
    pub fn expected_sha256(&self) -> Option<&'static str> {
        match self {
            ModelType::Detection => None,
            ModelType::Recognition => None,
        }
    }

    /// Display name for progress reporting
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelType::Detection => "Text Detection",
            ModelType::Recognition => "Text Recognition",
        }
    }
}

/// Model manifest tracking downloaded models
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ModelManifest {
    pub version: String,
    pub models: Vec<ModelInfo>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ModelInfo {
    pub model_type: String,
    pub filename: String,
    pub size_bytes: u64,
    pub sha256: Option<String>,
    pub downloaded_at: String,
}

impl Default for ModelManifest {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            models: Vec::new(),
        }
    }
}

/// Model manager for downloading and caching recognition models
pub struct ModelManager {
    models_dir: PathBuf,
}

impl ModelManager {
    /// Create a new model manager rooted at the application data directory
    pub fn new() -> Result<Self> {
        let data_dir = crate::config::data_dir()?;
        let models_dir = data_dir.join("models");
        std::fs::create_dir_all(&models_dir)?;

        Ok(Self { models_dir })
    }

    /// Create model manager with custom directory
    pub fn with_dir(models_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&models_dir)?;
        Ok(Self { models_dir })
    }

    /// Get the models directory path
    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Get the path to a specific model file
    pub fn model_path(&self, model_type: ModelType) -> PathBuf {
        self.models_dir.join(model_type.filename())
    }

    /// Check if a model is already downloaded
    pub fn is_model_available(&self, model_type: ModelType) -> bool {
        let path = self.model_path(model_type);
        if !path.exists() {
            return false;
        }

        // Verify file size is reasonable
        if let Ok(metadata) = std::fs::metadata(&path) {
            let (min, max) = model_type.expected_size_range();
            let size = metadata.len();
            size >= min && size <= max
        } else {
            false
        }
    }

    /// Check if all required models are available
    pub fn are_models_ready(&self) -> bool {
        self.is_model_available(ModelType::Detection)
            && self.is_model_available(ModelType::Recognition)
    }

    /// Get status of all models
    pub fn get_model_status(&self) -> Vec<(ModelType, bool, Option<u64>)> {
        [ModelType::Detection, ModelType::Recognition]
            .iter()
            .map(|&model_type| {
                let path = self.model_path(model_type);
                let available = self.is_model_available(model_type);
                let size = std::fs::metadata(&path).ok().map(|m| m.len());
                (model_type, available, size)
            })
            .collect()
    }

    /// Download a model if not already available
    ///
    /// Returns the path to the model file.
    pub async fn ensure_model(&self, model_type: ModelType) -> Result<PathBuf> {
        let path = self.model_path(model_type);

        if self.is_model_available(model_type) {
            debug!("Model {:?} already available at {:?}", model_type, path);
            return Ok(path);
        }

        info!("Downloading model {:?}...", model_type);
        self.download_model(model_type).await?;

        Ok(path)
    }

    /// Download all required models
    pub async fn ensure_all_models(&self) -> Result<()> {
        self.ensure_model(ModelType::Detection).await?;
        self.ensure_model(ModelType::Recognition).await?;
        Ok(())
    }

    /// Download a specific model
    async fn download_model(&self, model_type: ModelType) -> Result<()> {
        let url = model_type.download_url();
        let path = self.model_path(model_type);

        info!(
            "Downloading {} model from {}",
            model_type.display_name(),
            url
        );

        // Check if we're in offline mode
        if std::env::var("ENTITY_LENS_OFFLINE").is_ok() {
            anyhow::bail!(
                "Offline mode: cannot download models. Please download manually from {} and place at {:?}",
                url,
                path
            );
        }

        self.download_file(url, &path, model_type).await?;

        // Verify the download
        if !self.is_model_available(model_type) {
            anyhow::bail!("Download completed but model verification failed");
        }

        // Update manifest
        self.update_manifest_for_model(model_type)?;

        info!(
            "Successfully downloaded {} model",
            model_type.display_name()
        );
        Ok(())
    }

    /// Streaming download implementation
    async fn download_file(&self, url: &str, path: &Path, model_type: ModelType) -> Result<()> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .context("Failed to create HTTP client")?;

        let response = client
            .get(url)
            .send()
            .await
            .context("Failed to send download request")?;

        if !response.status().is_success() {
            anyhow::bail!("Download failed with status {}: {}", response.status(), url);
        }

        let total_size = response.content_length();
        debug!("Download size: {:?} bytes", total_size);

        // Create temp file for download
        let temp_path = path.with_extension("tmp");
        let mut file = std::fs::File::create(&temp_path).context("Failed to create temp file")?;

        let mut hasher = Sha256::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Error reading download stream")?;

            file.write_all(&chunk)
                .context("Failed to write to temp file")?;

            hasher.update(&chunk);
        }

        file.flush().context("Failed to flush temp file")?;
        drop(file);

        // Verify checksum if pinned
        let hash = format!("{:x}", hasher.finalize());
        if let Some(expected_hash) = model_type.expected_sha256() {
            if hash != expected_hash {
                std::fs::remove_file(&temp_path).ok();
                anyhow::bail!(
                    "Checksum mismatch for {}: expected {}, got {}",
                    model_type.filename(),
                    expected_hash,
                    hash
                );
            }
            info!("Checksum verified for {}", model_type.display_name());
        }

        // Move temp file to final location
        std::fs::rename(&temp_path, path)
            .context("Failed to move downloaded file to final location")?;

        Ok(())
    }

    /// Update manifest after successful download
    fn update_manifest_for_model(&self, model_type: ModelType) -> Result<()> {
        let mut manifest = self.load_manifest().unwrap_or_default();

        let path = self.model_path(model_type);
        let metadata = std::fs::metadata(&path)?;

        // Calculate SHA256
        let hash = {
            let data = std::fs::read(&path)?;
            let mut hasher = Sha256::new();
            hasher.update(&data);
            format!("{:x}", hasher.finalize())
        };

        let model_info = ModelInfo {
            model_type: format!("{:?}", model_type),
            filename: model_type.filename().to_string(),
            size_bytes: metadata.len(),
            sha256: Some(hash),
            downloaded_at: unix_timestamp_now(),
        };

        // Update or add model info
        if let Some(existing) = manifest
            .models
            .iter_mut()
            .find(|m| m.filename == model_info.filename)
        {
            *existing = model_info;
        } else {
            manifest.models.push(model_info);
        }

        self.save_manifest(&manifest)?;
        Ok(())
    }

    /// Load the model manifest
    pub fn load_manifest(&self) -> Result<ModelManifest> {
        let manifest_path = self.models_dir.join("manifest.json");
        if manifest_path.exists() {
            let content = std::fs::read_to_string(&manifest_path)?;
            let manifest: ModelManifest = serde_json::from_str(&content)?;
            Ok(manifest)
        } else {
            Ok(ModelManifest::default())
        }
    }

    /// Save the model manifest
    pub fn save_manifest(&self, manifest: &ModelManifest) -> Result<()> {
        let manifest_path = self.models_dir.join("manifest.json");
        let content = serde_json::to_string_pretty(manifest)?;
        std::fs::write(manifest_path, content)?;
        Ok(())
    }
}

/// Current Unix timestamp as a string (lightweight alternative to chrono)
fn unix_timestamp_now() -> String {
    use std::time::SystemTime;

    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    format!("{}", now)
}
