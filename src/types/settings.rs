use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

pub const DEFAULT_FADE_DURATION: f64 = 0.5;
const SETTINGS_FILE: &str = "settings.json";

/// User preferences kept between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub fade_duration: f64,
    pub fast_mode: bool,
    pub last_directory: Option<PathBuf>,
    pub window_size: (f32, f32),
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fade_duration: DEFAULT_FADE_DURATION,
            fast_mode: false,
            last_directory: None,
            window_size: (1200.0, 800.0),
        }
    }
}

impl Settings {
    /// `settings.json` in the platform config directory.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "sitg", "sitg-trimmer")
            .map(|dirs| dirs.config_dir().join(SETTINGS_FILE))
    }

    /// Negative fades make no sense; treat them as no fade.
    pub fn set_fade_duration(&mut self, seconds: f64) {
        self.fade_duration = if seconds.is_finite() {
            seconds.max(0.0)
        } else {
            DEFAULT_FADE_DURATION
        };
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        debug!(path = %path.display(), "settings saved");
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Settings> {
        let mut file = File::open(path)?;
        let mut json = String::new();
        file.read_to_string(&mut json)?;
        let mut settings: Settings = serde_json::from_str(&json)?;
        settings.set_fade_duration(settings.fade_duration);
        Ok(settings)
    }

    /// Loads from the default location, falling back to defaults.
    pub fn load() -> Settings {
        let Some(path) = Self::default_path() else {
            return Settings::default();
        };
        if !path.exists() {
            return Settings::default();
        }
        Self::load_from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), %err, "could not read settings, using defaults");
            Settings::default()
        })
    }

    pub fn save(&self) {
        let Some(path) = Self::default_path() else {
            return;
        };
        if let Err(err) = self.save_to_file(&path) {
            warn!(path = %path.display(), %err, "could not save settings");
        }
    }
}
