use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings JSON invalid: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tunables for the hierarchy editor. Every field has a default so partial files load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorSettings {
    /// Scales at or below this are refused by zoom and clamped by fit-to-screen.
    pub zoom_out_limit: f64,
    /// Scales at or above this are refused by zoom and clamped by fit-to-screen.
    pub zoom_in_limit: f64,
    pub wheel_zoom_in_factor: f64,
    pub wheel_zoom_out_factor: f64,
    pub pan: bool,
    /// Allow panning while the editor is read-only.
    pub pan_when_read_only: bool,
    pub multiple_select: bool,
    /// Render clones collapsed until the user expands them.
    pub collapse_clones: bool,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            zoom_out_limit: 0.05,
            zoom_in_limit: 1.0,
            wheel_zoom_in_factor: 1.05,
            wheel_zoom_out_factor: 0.9,
            pan: true,
            pan_when_read_only: true,
            multiple_select: false,
            collapse_clones: true,
        }
    }
}

impl EditorSettings {
    /// Replace limits and wheel factors that could make a zero, negative or
    /// non-finite scale reachable with their defaults.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.zoom_out_limit)
            || !positive(self.zoom_in_limit)
            || self.zoom_in_limit <= self.zoom_out_limit
        {
            tracing::warn!(
                zoom_out_limit = self.zoom_out_limit,
                zoom_in_limit = self.zoom_in_limit,
                "invalid zoom limits, using defaults"
            );
            self.zoom_out_limit = defaults.zoom_out_limit;
            self.zoom_in_limit = defaults.zoom_in_limit;
        }
        if !positive(self.wheel_zoom_in_factor) {
            self.wheel_zoom_in_factor = defaults.wheel_zoom_in_factor;
        }
        if !positive(self.wheel_zoom_out_factor) {
            self.wheel_zoom_out_factor = defaults.wheel_zoom_out_factor;
        }
        self
    }
}

/// Resolve the settings directory (~/.fundtree/).
pub fn settings_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".fundtree")
}

fn settings_path() -> PathBuf {
    settings_dir().join("settings.json")
}

/// Read editor settings, falling back to defaults when the file is missing or unreadable.
pub fn read_settings() -> EditorSettings {
    read_settings_from(&settings_path())
}

pub fn read_settings_from(path: &Path) -> EditorSettings {
    if !path.exists() {
        return EditorSettings::default();
    }
    let parsed = fs::read_to_string(path)
        .map_err(SettingsError::from)
        .and_then(|raw| serde_json::from_str::<EditorSettings>(&raw).map_err(SettingsError::from));
    match parsed {
        Ok(settings) => settings.sanitized(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable settings, using defaults");
            EditorSettings::default()
        }
    }
}

pub fn write_settings(settings: &EditorSettings) -> Result<(), SettingsError> {
    write_settings_to(&settings_path(), settings)
}

pub fn write_settings_to(path: &Path, settings: &EditorSettings) -> Result<(), SettingsError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;
    Ok(())
}
