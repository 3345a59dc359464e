//! Installer settings.
//!
//! Settings are persisted to `~/ex-installer/settings.json`.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::toolchain::paths;

/// Release server for arduino-cli archives.
pub const DEFAULT_DOWNLOAD_BASE_URL: &str = "https://downloads.arduino.cc/arduino-cli";

/// Default minimum percentage between download progress messages.
pub const DEFAULT_PROGRESS_STEP_PERCENT: u8 = 5;

// =============================================================================
// Installer Settings
// =============================================================================

/// Installer settings - persisted to disk as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Overrides the application directory (`~/ex-installer`).
    pub install_root: Option<PathBuf>,

    /// Base URL release archives are fetched from. Must be HTTPS on an
    /// allowed host or the download is rejected.
    pub download_base_url: String,

    /// Minimum increase in percent between download progress messages.
    pub progress_step_percent: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            install_root: None,
            download_base_url: DEFAULT_DOWNLOAD_BASE_URL.to_string(),
            progress_step_percent: DEFAULT_PROGRESS_STEP_PERCENT,
        }
    }
}

impl Settings {
    /// Load settings from `path`, using defaults for missing values.
    ///
    /// If the file doesn't exist or can't be parsed, returns defaults.
    pub fn load(path: &Path) -> Self {
        let mut settings = Self::default();

        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str::<Settings>(&json) {
                Ok(loaded) => settings = loaded,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        path = %path.display(),
                        "Failed to parse settings, using defaults"
                    );
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No settings file, using defaults");
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %path.display(),
                    "Failed to read settings, using defaults"
                );
            }
        }

        settings.validate();
        settings
    }

    /// Load settings from the default location.
    pub fn load_default() -> Self {
        Self::load(&paths::settings_path())
    }

    /// Save settings to `path`, creating its directory if needed.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write settings: {}", path.display()))?;
        Ok(())
    }

    /// Validate and clamp settings to valid ranges.
    pub fn validate(&mut self) {
        self.progress_step_percent = self.progress_step_percent.clamp(1, 100);

        let trimmed = self.download_base_url.trim().trim_end_matches('/');
        self.download_base_url = if trimmed.is_empty() {
            DEFAULT_DOWNLOAD_BASE_URL.to_string()
        } else {
            trimmed.to_string()
        };
    }

    /// The application directory the tool is installed under.
    pub fn install_root(&self) -> PathBuf {
        self.install_root
            .clone()
            .unwrap_or_else(paths::default_install_root)
    }
}
