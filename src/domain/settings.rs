use crate::error::MugError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "ember_mug".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MugSettings {
    /// Display temperatures in Celsius
    #[serde(default = "default_true")]
    pub use_metric: bool,
    /// Expose diagnostic attributes and subscribe to statistics
    #[serde(default = "default_false")]
    pub debug: bool,
    /// BlueZ adapter name, e.g. "hci1". Linux only.
    #[serde(default)]
    pub adapter: Option<String>,
    #[serde(default)]
    pub last_connected_address: Option<String>,

    // Polling
    #[serde(default = "default_debounce_window_secs")]
    pub debounce_window_secs: u64,
    #[serde(default = "default_full_refresh_every")]
    pub full_refresh_every: u32,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for MugSettings {
    fn default() -> Self {
        Self {
            use_metric: true,
            debug: false,
            adapter: None,
            last_connected_address: None,
            debounce_window_secs: default_debounce_window_secs(),
            full_refresh_every: default_full_refresh_every(),
            poll_interval_ms: default_poll_interval_ms(),
            log_settings: LogSettings::default(),
        }
    }
}

// Empirical firmware timings, keep unless re-verified on hardware
fn default_debounce_window_secs() -> u64 {
    5
}
fn default_full_refresh_every() -> u32 {
    60
}
fn default_poll_interval_ms() -> u64 {
    1000
}

impl MugSettings {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_secs(self.debounce_window_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject options the current platform cannot honour.
    pub fn validate(&self) -> Result<(), MugError> {
        if self.adapter.is_some() && !cfg!(target_os = "linux") {
            return Err(MugError::Config(
                "the adapter option is only valid for the Linux BlueZ backend".to_string(),
            ));
        }
        if self.full_refresh_every == 0 {
            return Err(MugError::Config(
                "full_refresh_every must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

pub struct SettingsService {
    settings: MugSettings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::with_path(settings_path))
    }

    /// Load from an explicit path, falling back to defaults.
    pub fn with_path(settings_path: PathBuf) -> Self {
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();
        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("EmberMug");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<MugSettings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &MugSettings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut MugSettings {
        &mut self.settings
    }

    pub fn set_last_connected_address(&mut self, address: &str) -> anyhow::Result<()> {
        if self.settings.last_connected_address.as_deref() != Some(address) {
            self.settings.last_connected_address = Some(address.to_string());
            self.save()?;
        }
        Ok(())
    }
}
