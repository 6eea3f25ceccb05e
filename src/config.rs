//! Configuration management for system-info-collector
//!
//! Config file location:
//! - Linux: ~/.config/system-info-collector/config.toml
//! - macOS: ~/Library/Application Support/com.esports-survey.system-info-collector/config.toml
//! - Windows: %APPDATA%/esports-survey/system-info-collector/config/config.toml
//!
//! You can override the config location by setting `SYSTEM_INFO_COLLECTOR_CONFIG_PATH`.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_PATH_ENV: &str = "SYSTEM_INFO_COLLECTOR_CONFIG_PATH";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Hardware provider settings
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Report presentation
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from file or fall back to defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", config_path.display()))
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(config_path, toml)
            .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Ok(PathBuf::from(trimmed));
            }
        }

        let proj_dirs = ProjectDirs::from("com", "esports-survey", "system-info-collector")
            .context("Could not determine project directories")?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Write the current (or default) config if no file exists yet
    pub fn init() -> Result<(Self, PathBuf)> {
        let config_path = Self::config_path()?;
        let config = Self::load_from(&config_path)?;

        if !config_path.exists() {
            config.save_to(&config_path)?;
        }

        Ok((config, config_path))
    }
}

/// Provider configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Upper bound for each external command, in seconds
    #[serde(default = "default_command_timeout")]
    pub command_timeout_seconds: u64,

    /// nvidia-smi executable name or path
    #[serde(default = "default_nvidia_smi_path")]
    pub nvidia_smi_path: String,

    /// Query the OS inventory for GPUs telemetry missed
    #[serde(default = "default_true")]
    pub gpu_inventory: bool,

    /// Use `lspci` as the Linux GPU inventory. Off by default: lspci names
    /// (e.g. "NVIDIA Corporation GA104 [GeForce RTX 3070]") never match the
    /// nvidia-smi names, so every NVIDIA card would be listed twice.
    #[serde(default)]
    pub lspci_inventory: bool,

    /// Append controller-level display entries (Windows)
    #[serde(default = "default_true")]
    pub video_controllers: bool,
}

impl ProbeConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_seconds.max(1))
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            command_timeout_seconds: default_command_timeout(),
            nvidia_smi_path: default_nvidia_smi_path(),
            gpu_inventory: true,
            lspci_inventory: false,
            video_controllers: true,
        }
    }
}

fn default_command_timeout() -> u64 {
    20
}

fn default_nvidia_smi_path() -> String {
    "nvidia-smi".to_string()
}

fn default_true() -> bool {
    true
}

/// Output configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Copy the report to the clipboard after printing it
    #[serde(default)]
    pub copy_to_clipboard: bool,
}
