//! Shell configuration and errors.

use driftboard_core::EditorConfig;
use driftboard_core::input::Platform;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Shell errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("No script given; pass a path or set `script` in the config")]
    NoScript,
    #[error(transparent)]
    Editor(#[from] driftboard_core::EditorError),
    #[error(transparent)]
    Link(#[from] driftboard_core::LinkError),
}

/// Result type for shell operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Title of the page the session starts on. `None` gives the default title.
    pub title: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Overrides the platform the primary modifier is resolved for.
    pub platform: Option<Platform>,
    /// Script replayed when none is given on the command line.
    pub script: Option<PathBuf>,
    pub editor: EditorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: None,
            width: 1280,
            height: 800,
            platform: None,
            script: None,
            editor: EditorConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> AppResult<Self> {
        let json = fs::read_to_string(path)
            .map_err(|e| AppError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&json).map_err(|e| {
            AppError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Editor settings with the platform override applied.
    pub fn editor_config(&self) -> EditorConfig {
        let mut editor = self.editor.clone();
        if let Some(platform) = self.platform {
            editor.platform = platform;
        }
        editor
    }
}
