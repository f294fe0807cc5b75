//! Persistent application settings (JSON file in the data directory).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Duration ids the script collaborators understand.
pub const KNOWN_DURATIONS: [&str; 3] = ["2-minute", "5-minute", "10-minute"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    /// Base URL of the script-generation API. `None` uses the built-in
    /// canned scripts.
    pub api_base_url: Option<String>,
    /// BCP 47 language tag handed to the recognizer.
    pub language: String,
    pub default_topic: String,
    pub default_duration: String,
    /// Override for the score database location.
    pub db_path: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_base_url: None,
            language: "en-US".into(),
            default_topic: "Technology".into(),
            default_duration: "2-minute".into(),
            db_path: None,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.api_base_url = self
            .api_base_url
            .as_ref()
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty());
        self.language = {
            let trimmed = self.language.trim();
            if trimmed.is_empty() {
                "en-US".into()
            } else {
                trimmed.to_string()
            }
        };
        if !KNOWN_DURATIONS.contains(&self.default_duration.as_str()) {
            self.default_duration = "2-minute".into();
        }
        if self.default_topic.trim().is_empty() {
            self.default_topic = "Technology".into();
        }
    }
}

/// Data directory: `$RECITAL_DATA_DIR`, or `.recital` under the home
/// directory, or the working directory as a last resort.
pub fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("RECITAL_DATA_DIR") {
        return PathBuf::from(dir);
    }
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(|home| Path::new(&home).join(".recital"))
        .unwrap_or_else(|_| PathBuf::from(".recital"))
}

pub fn default_settings_path() -> PathBuf {
    default_data_dir().join("settings.json")
}

/// Load settings, falling back to defaults when the file is missing or
/// unreadable. Always normalized.
pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<AppSettings>(&raw).ok())
        .unwrap_or_default();
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
