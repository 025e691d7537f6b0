//! Configuration settings for tapkit.
//!
//! Settings are loaded from `~/.tapkit/config.yaml`.

use serde::{Deserialize, Serialize};

use crate::cli::args::OutputFormat;
use crate::error::TapkitError;
use crate::features::queue::QueueConfig;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// General settings.
    pub general: GeneralConfig,
    /// Offline queue settings.
    pub queue: QueueSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Default output format.
    #[serde(default = "default_output_format")]
    pub default_output: OutputFormat,
}

/// Offline queue tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Base retry delay in milliseconds (first backoff step).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on any single retry delay in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Retry budget applied when the caller does not supply one.
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,
    /// Completed/failed entries older than this many minutes are swept.
    #[serde(default = "default_retention_minutes")]
    pub retention_minutes: u64,
    /// Dead-letter entries older than this many hours are swept.
    #[serde(default = "default_dead_letter_retention_hours")]
    pub dead_letter_retention_hours: u64,
    /// Minutes between periodic cleanup sweeps.
    #[serde(default = "default_cleanup_interval_minutes")]
    pub cleanup_interval_minutes: u64,
    /// Enqueues between opportunistic cleanup sweeps.
    #[serde(default = "default_sweep_after_enqueues")]
    pub sweep_after_enqueues: usize,
    /// Maximum size in bytes of a persisted queue blob.
    #[serde(default = "default_max_value_bytes")]
    pub max_value_bytes: usize,
}

// Default value functions for serde
const fn default_output_format() -> OutputFormat {
    OutputFormat::Pretty
}

const fn default_base_delay_ms() -> u64 {
    1000
}

const fn default_max_delay_ms() -> u64 {
    30_000
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_retention_minutes() -> u64 {
    60
}

const fn default_dead_letter_retention_hours() -> u64 {
    168 // one week
}

const fn default_cleanup_interval_minutes() -> u64 {
    5
}

const fn default_sweep_after_enqueues() -> usize {
    25
}

const fn default_max_value_bytes() -> usize {
    2 * 1024 * 1024
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_output: default_output_format(),
        }
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            default_max_retries: default_max_retries(),
            retention_minutes: default_retention_minutes(),
            dead_letter_retention_hours: default_dead_letter_retention_hours(),
            cleanup_interval_minutes: default_cleanup_interval_minutes(),
            sweep_after_enqueues: default_sweep_after_enqueues(),
            max_value_bytes: default_max_value_bytes(),
        }
    }
}

impl QueueSettings {
    /// Convert file settings into the engine configuration.
    #[must_use]
    pub fn to_queue_config(&self) -> QueueConfig {
        QueueConfig {
            base_delay_ms: self.base_delay_ms,
            max_delay_ms: self.max_delay_ms,
            retention_minutes: self.retention_minutes,
            dead_letter_retention_hours: self.dead_letter_retention_hours,
            cleanup_interval: std::time::Duration::from_secs(
                self.cleanup_interval_minutes.saturating_mul(60),
            ),
            sweep_after_enqueues: self.sweep_after_enqueues,
        }
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self, TapkitError> {
        let paths = crate::config::Paths::new()?;
        Self::load_from_path(&paths.config_file)
    }

    /// Load configuration from a specific path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load_from_path(path: &std::path::Path) -> Result<Self, TapkitError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            TapkitError::Config(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        serde_yaml::from_str(&contents).map_err(|e| {
            TapkitError::Config(format!(
                "Failed to parse config file {}: {e}",
                path.display()
            ))
        })
    }

    /// Save configuration to a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be written.
    pub fn save_to_path(&self, path: &std::path::Path) -> Result<(), TapkitError> {
        let contents = serde_yaml::to_string(self)
            .map_err(|e| TapkitError::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, contents).map_err(|e| {
            TapkitError::Config(format!(
                "Failed to write config file {}: {e}",
                path.display()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.general.default_output, OutputFormat::Pretty);
        assert_eq!(config.queue.base_delay_ms, 1000);
        assert_eq!(config.queue.max_delay_ms, 30_000);
        assert_eq!(config.queue.default_max_retries, 3);
        assert_eq!(config.queue.retention_minutes, 60);
        assert_eq!(config.queue.dead_letter_retention_hours, 168);
    }

    #[test]
    fn test_load_missing_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let config = Config::load_from_path(&config_path).unwrap();

        // Should return defaults when file doesn't exist
        assert_eq!(config.queue.sweep_after_enqueues, 25);
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut config = Config::default();
        config.queue.base_delay_ms = 500;
        config.queue.retention_minutes = 15;

        config.save_to_path(&config_path).unwrap();

        let loaded = Config::load_from_path(&config_path).unwrap();

        assert_eq!(loaded.queue.base_delay_ms, 500);
        assert_eq!(loaded.queue.retention_minutes, 15);
    }

    #[test]
    fn test_partial_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        // Write a partial config (only some fields)
        let partial_yaml = r"
queue:
  max_delay_ms: 60000
";
        std::fs::write(&config_path, partial_yaml).unwrap();

        let config = Config::load_from_path(&config_path).unwrap();

        // Custom value should be loaded
        assert_eq!(config.queue.max_delay_ms, 60_000);
        // Defaults should be used for missing fields
        assert_eq!(config.queue.base_delay_ms, 1000);
        assert_eq!(config.general.default_output, OutputFormat::Pretty);
    }

    #[test]
    fn test_to_queue_config() {
        let settings = QueueSettings::default();
        let qc = settings.to_queue_config();

        assert_eq!(qc.base_delay_ms, 1000);
        assert_eq!(qc.cleanup_interval, std::time::Duration::from_secs(300));
    }
}
