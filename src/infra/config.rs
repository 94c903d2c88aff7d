//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml

use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SiteConfig {
    /// Unique deployment identifier (e.g., "reykjavik", "akureyri")
    #[serde(default = "default_site_id")]
    pub id: String,
}

fn default_site_id() -> String {
    "autocheckout".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    /// Hourly parking rate, single engine-wide constant
    #[serde(default = "default_rate_per_hour")]
    pub rate_per_hour: f64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self { rate_per_hour: default_rate_per_hour() }
    }
}

fn default_rate_per_hour() -> f64 {
    2.5
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    /// Maximum position samples retained per subject
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
    /// Samples older than this are purged by the sweep
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    /// Interval between history sweeps
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_samples: default_max_samples(),
            retention_secs: default_retention_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_max_samples() -> usize {
    50
}

fn default_retention_secs() -> u64 {
    2 * 60 * 60
}

fn default_sweep_interval_secs() -> u64 {
    5 * 60
}

#[derive(Debug, Clone, Deserialize, Default)]
struct TomlConfig {
    #[serde(default)]
    site: SiteConfig,
    #[serde(default)]
    billing: BillingConfig,
    #[serde(default)]
    tracker: TrackerConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    site_id: String,
    rate_per_hour: f64,
    max_samples: usize,
    retention_secs: u64,
    sweep_interval_secs: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_id: default_site_id(),
            rate_per_hour: default_rate_per_hour(),
            max_samples: default_max_samples(),
            retention_secs: default_retention_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Determine the config file path: explicit CLI value first, then the
    /// CONFIG_FILE environment variable, then the default
    pub fn resolve_config_path(cli_path: Option<&str>) -> String {
        if let Some(path) = cli_path {
            return path.to_string();
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self {
            site_id: toml_config.site.id,
            rate_per_hour: toml_config.billing.rate_per_hour,
            max_samples: toml_config.tracker.max_samples,
            retention_secs: toml_config.tracker.retention_secs,
            sweep_interval_secs: toml_config.tracker.sweep_interval_secs,
            config_file: path.display().to_string(),
        })
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {}. Using defaults.", e);
                Self::default()
            }
        }
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn rate_per_hour(&self) -> f64 {
        self.rate_per_hour
    }

    pub fn max_samples(&self) -> usize {
        self.max_samples
    }

    pub fn retention_ms(&self) -> u64 {
        self.retention_secs * 1000
    }

    pub fn sweep_interval_secs(&self) -> u64 {
        self.sweep_interval_secs
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.site_id(), "autocheckout");
        assert_eq!(config.rate_per_hour(), 2.5);
        assert_eq!(config.max_samples(), 50);
        assert_eq!(config.retention_ms(), 7_200_000);
        assert_eq!(config.sweep_interval_secs(), 300);
    }

    #[test]
    fn test_resolve_config_path_prefers_cli_value() {
        assert_eq!(
            Config::resolve_config_path(Some("config/reykjavik.toml")),
            "config/reykjavik.toml"
        );
    }

    #[test]
    fn test_resolve_config_path_env_fallback_then_default() {
        // Both cases in one test so parallel tests never race on the variable
        env::remove_var("CONFIG_FILE");
        assert_eq!(Config::resolve_config_path(None), "config/dev.toml");

        env::set_var("CONFIG_FILE", "config/akureyri.toml");
        assert_eq!(Config::resolve_config_path(None), "config/akureyri.toml");
        env::remove_var("CONFIG_FILE");
    }
}
