use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from `~/.warden/config.toml`.
///
/// Every section falls back to defaults when absent, so a missing config
/// file is equivalent to an empty one.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub approvals: ApprovalsConfig,
    #[serde(default)]
    pub service: ServiceConfig,
}

impl Config {
    /// Load config from the default path, falling back to defaults when the
    /// file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(path)
        } else {
            tracing::debug!("no config file, using defaults");
            let cfg = Config::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let cfg: Config = toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Semantic validation for settings not expressible via type checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.approvals.wait_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "approvals.wait_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.service.channel_capacity == 0 {
            return Err(ConfigError::Validation(
                "service.channel_capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".warden")
            .join("config.toml")
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("validation: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Section structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalsConfig {
    /// Extra time past expiry before an undecided approval is pruned.
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,
    /// Upper bound on the blocking wait issued against a paused run during
    /// auto-resume. Elapsing is a normal outcome, not an error.
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
}

impl Default for ApprovalsConfig {
    fn default() -> Self {
        Self {
            grace_ms: default_grace_ms(),
            wait_timeout_ms: default_wait_timeout_ms(),
        }
    }
}

fn default_grace_ms() -> u64 {
    60_000
}
fn default_wait_timeout_ms() -> u64 {
    120_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Capacity of the inbound notification channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Floor on the computed prune delay, so an overdue expiry cannot spin
    /// the service loop.
    #[serde(default = "default_min_prune_delay_ms")]
    pub min_prune_delay_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            min_prune_delay_ms: default_min_prune_delay_ms(),
        }
    }
}

fn default_channel_capacity() -> usize {
    256
}
fn default_min_prune_delay_ms() -> u64 {
    50
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
