use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::i18n::Language;

/// Lowest polling interval accepted from any configuration source
pub const MIN_POLLING_INTERVAL_MS: u64 = 30_000;

/// Polling interval used when none is configured
pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 120_000;

/// Application settings (from config file)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Poll the language server at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Polling interval in milliseconds (clamped to at least 30s)
    #[serde(default = "default_polling_interval")]
    pub polling_interval_ms: u64,

    /// Show prompt credits alongside model quotas
    #[serde(default = "default_show_extra_credits")]
    pub show_extra_credits: bool,

    /// Display language
    #[serde(default)]
    pub language: Language,

    /// Model ids shown on the status line (empty = all)
    #[serde(default)]
    pub pinned_models: Vec<String>,

    /// Process discovery settings
    #[serde(default)]
    pub discovery: DiscoverySettings,
}

fn default_enabled() -> bool {
    true
}

fn default_polling_interval() -> u64 {
    DEFAULT_POLLING_INTERVAL_MS
}

fn default_show_extra_credits() -> bool {
    true
}

/// Process discovery settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoverySettings {
    /// Whole-attempt retries per discovery run
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Pause before re-running discovery after it gave up (milliseconds)
    #[serde(default = "default_rediscover_delay")]
    pub rediscover_delay_ms: u64,

    /// Application name that marks an owned language server process
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_rediscover_delay() -> u64 {
    10_000
}

fn default_app_name() -> String {
    "antigravity".to_string()
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            rediscover_delay_ms: default_rediscover_delay(),
            app_name: default_app_name(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            polling_interval_ms: default_polling_interval(),
            show_extra_credits: default_show_extra_credits(),
            language: Language::default(),
            pinned_models: Vec::new(),
            discovery: DiscoverySettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from config file or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        // Try custom path first
        if let Some(p) = path {
            if p.exists() {
                return Self::load_from(p);
            }
        }

        for path in Self::default_paths() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        // Return defaults if no config file found
        Ok(Self::default())
    }

    /// Read and parse one config file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Candidate config file locations, most specific first
    pub fn default_paths() -> Vec<PathBuf> {
        [
            dirs::config_dir().map(|p| p.join("agquota/config.toml")),
            dirs::home_dir().map(|p| p.join(".config/agquota/config.toml")),
            dirs::home_dir().map(|p| p.join(".agquota.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Path of the config file `load` would read, if any exists
    pub fn resolve_path(path: Option<&PathBuf>) -> Option<PathBuf> {
        if let Some(p) = path {
            if p.exists() {
                return Some(p.clone());
            }
        }
        Self::default_paths().into_iter().find(|p| p.exists())
    }

    /// Validate and normalize settings values
    ///
    /// Invalid values are clamped rather than rejected.
    pub fn validate(&mut self) {
        if self.polling_interval_ms < MIN_POLLING_INTERVAL_MS {
            warn!(
                configured = self.polling_interval_ms,
                minimum = MIN_POLLING_INTERVAL_MS,
                "Polling interval below minimum, clamping"
            );
            self.polling_interval_ms = MIN_POLLING_INTERVAL_MS;
        }
        if self.discovery.max_attempts == 0 {
            warn!("discovery.max_attempts must be at least 1, clamping");
            self.discovery.max_attempts = 1;
        }
        if self.discovery.app_name.trim().is_empty() {
            warn!("discovery.app_name is empty, using default");
            self.discovery.app_name = default_app_name();
        }
    }

    /// Polling interval as a `Duration`
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }
}
