//! System-wide settings loaded from a JSON file.

use std::path::PathBuf;
use std::sync::Arc;

use appeals_common::{AppError, AppResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Threshold used when none is configured.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.8;

/// City-level settings shared with clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSettings {
    #[serde(default)]
    pub city_name: String,
    #[serde(default)]
    pub map_center_lat: f64,
    #[serde(default)]
    pub map_center_lng: f64,
    #[serde(default)]
    pub map_zoom: i32,
    #[serde(default)]
    pub confidence_threshold: f64,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            city_name: "Kyiv".to_string(),
            map_center_lat: 50.4501,
            map_center_lng: 30.5234,
            map_zoom: 13,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

impl SystemSettings {
    /// Auto-routing threshold in `(0, 1]`. Unset or non-positive values fall
    /// back to the default.
    #[must_use]
    pub fn effective_threshold(&self) -> f64 {
        let t = self.confidence_threshold;
        if t.is_nan() || t <= 0.0 {
            DEFAULT_CONFIDENCE_THRESHOLD
        } else {
            t.min(1.0)
        }
    }
}

/// Read-only settings source, consulted on every call.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    async fn get_settings(&self) -> AppResult<SystemSettings>;
}

/// Shared settings handle.
pub type SettingsService = Arc<dyn SettingsProvider>;

/// Reads the settings file on each call so edits apply without a restart.
#[derive(Debug, Clone)]
pub struct FileSettingsProvider {
    path: PathBuf,
}

impl FileSettingsProvider {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SettingsProvider for FileSettingsProvider {
    async fn get_settings(&self) -> AppResult<SystemSettings> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SystemSettings::default());
            }
            Err(e) => {
                return Err(AppError::Internal(format!(
                    "Failed to read settings file {}: {e}",
                    self.path.display()
                )));
            }
        };

        let mut settings: SystemSettings = serde_json::from_slice(&data)
            .map_err(|e| AppError::Config(format!("Invalid settings file: {e}")))?;
        settings.confidence_threshold = settings.effective_threshold();
        Ok(settings)
    }
}

/// Fixed settings, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings(pub SystemSettings);

impl StaticSettings {
    /// Defaults with the given threshold.
    #[must_use]
    pub fn with_threshold(threshold: f64) -> Self {
        Self(SystemSettings {
            confidence_threshold: threshold,
            ..SystemSettings::default()
        })
    }
}

#[async_trait]
impl SettingsProvider for StaticSettings {
    async fn get_settings(&self) -> AppResult<SystemSettings> {
        Ok(self.0.clone())
    }
}
