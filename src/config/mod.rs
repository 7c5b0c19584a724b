//! Application Configuration
//!
//! User settings stored in TOML format under the platform config
//! directory, plus the data/config directory helpers.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::capture::Rotation;
use crate::extract::EntityKind;
use crate::vision::RecognizerBackend;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Capture settings
    pub capture: CaptureSettings,
    /// Recognition settings
    pub recognition: RecognitionSettings,
    /// Extraction settings
    pub extraction: ExtractionSettings,
}

/// Capture-related settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Default still source when none is given on the command line
    pub source: Option<PathBuf>,
    /// Rotation correction applied to captured frames
    pub rotation: Rotation,
}

/// Recognition-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionSettings {
    /// Recognition backend
    pub backend: RecognizerBackend,
    /// Override for the model cache directory
    pub models_dir: Option<PathBuf>,
    /// Upscale small captures before recognition
    pub upscale_small: bool,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            backend: RecognizerBackend::default(),
            models_dir: None,
            upscale_small: true,
        }
    }
}

/// Extraction-related settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Restrict annotation to these kinds; empty means all kinds
    pub kinds: Vec<EntityKind>,
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Get the application data directory
pub fn data_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "entitylens", "EntityLens")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;

    let data_dir = proj_dirs.data_dir().to_path_buf();
    std::fs::create_dir_all(&data_dir)?;

    Ok(data_dir)
}

/// Get the configuration directory
pub fn config_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "entitylens", "EntityLens")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    let config_dir = proj_dirs.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}
