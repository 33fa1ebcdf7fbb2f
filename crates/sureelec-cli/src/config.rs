//! Configuration management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use sureelec_hw::SessionOptions;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Serial device the module is attached to
    #[serde(default = "default_device")]
    pub device: String,

    /// Longest wait for response bytes, in milliseconds
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,

    /// Display settings applied by long-running commands
    #[serde(default)]
    pub display: DisplayConfig,

    /// System stats screen configuration
    #[serde(default)]
    pub stats: StatsConfig,

    /// Character map configuration
    #[serde(default)]
    pub charmap: CharmapConfig,
}

/// Display settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Contrast level (1-255)
    #[serde(default = "default_contrast")]
    pub contrast: i32,

    /// Backlight brightness (1-255)
    #[serde(default = "default_brightness")]
    pub brightness: i32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            contrast: default_contrast(),
            brightness: default_brightness(),
        }
    }
}

/// System stats screen configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Redraw interval in milliseconds
    #[serde(default = "default_stats_interval")]
    pub interval_ms: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_stats_interval(),
        }
    }
}

/// Character map configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharmapConfig {
    /// Time each page stays on screen, in milliseconds
    #[serde(default = "default_page")]
    pub page_ms: u64,
}

impl Default for CharmapConfig {
    fn default() -> Self {
        Self {
            page_ms: default_page(),
        }
    }
}

// Default value functions
fn default_device() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_read_timeout() -> u64 {
    1000
}

fn default_contrast() -> i32 {
    1
}

fn default_brightness() -> i32 {
    254
}

fn default_stats_interval() -> u64 {
    500
}

fn default_page() -> u64 {
    5000
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse configuration")?;
        Ok(config)
    }

    /// Session timing derived from this configuration.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            ..SessionOptions::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: default_device(),
            read_timeout_ms: default_read_timeout(),
            display: DisplayConfig::default(),
            stats: StatsConfig::default(),
            charmap: CharmapConfig::default(),
        }
    }
}
