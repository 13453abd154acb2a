//! Configuration loading

use anyhow::{Context, Result};
use pixelpipe_discovery::ScannerConfig;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Descriptor used by `run` when none is given on the command line
    #[serde(default)]
    pub descriptor: Option<String>,
    /// Frames per second for the render loop
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Pause between sibling flushes in a combo, in milliseconds
    #[serde(default = "default_write_spacing_ms")]
    pub write_spacing_ms: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            descriptor: None,
            fps: default_fps(),
            write_spacing_ms: default_write_spacing_ms(),
        }
    }
}

impl OutputConfig {
    pub fn write_spacing(&self) -> Duration {
        Duration::from_millis(self.write_spacing_ms)
    }
}

fn default_fps() -> u32 {
    30
}

fn default_write_spacing_ms() -> u64 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Broadcast address; every interface's when unset
    #[serde(default)]
    pub broadcast: Option<Ipv4Addr>,
    /// Reply window in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Query each supply for its ports
    #[serde(default = "default_true")]
    pub enumerate: bool,
    /// Pixel count for supplies that report none
    #[serde(default = "default_count")]
    pub default_count: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            broadcast: None,
            timeout_ms: default_timeout_ms(),
            enumerate: true,
            default_count: default_count(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    250
}

fn default_true() -> bool {
    true
}

fn default_count() -> usize {
    pixelpipe_kinet::DEFAULT_PIXEL_COUNT
}

impl Config {
    /// Convert to ScannerConfig
    pub fn to_scanner_config(&self) -> ScannerConfig {
        ScannerConfig {
            broadcast: self.discovery.broadcast,
            timeout_ms: self.discovery.timeout_ms,
            enumerate: self.discovery.enumerate,
            default_count: self.discovery.default_count,
            ..ScannerConfig::default()
        }
    }
}

/// Load configuration from file, defaults when it does not exist
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}
