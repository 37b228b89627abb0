use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// BoeConfig
// ---------------------------------------------------------------------------

/// Client configuration stored at `~/.boe/config.json`.
///
/// Secrets (private keys, explorer API keys) are never part of this file. They
/// are read from the environment by the deployment binary only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoeConfig {
    /// Network used when `--network` is not given (`"mainnet"` or `"sepolia"`).
    pub default_chain: String,

    // Confirmation watching
    pub confirmations: u64,
    pub poll_interval_secs: u64,
    /// `0` disables the bounded wait.
    pub receipt_timeout_secs: u64,

    // Submission
    pub min_resubmit_interval_ms: u64,

    // Display
    pub token_decimals: u8,

    // General
    /// Default `tracing` filter directive when `RUST_LOG` is unset, e.g.
    /// `"info"` or `"warn,boe_ledger=debug"`.
    pub log_level: String,
}

impl Default for BoeConfig {
    fn default() -> Self {
        Self {
            default_chain: "sepolia".into(),
            confirmations: 1,
            poll_interval_secs: 4,
            receipt_timeout_secs: 600,
            min_resubmit_interval_ms: 1_500,
            token_decimals: 18,
            log_level: "info".into(),
        }
    }
}

impl BoeConfig {
    /// Returns the base config directory: `~/.boe/`
    pub fn base_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".boe"))
    }

    /// Returns the config file path: `~/.boe/config.json`
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("config.json"))
    }

    /// Returns the logs directory: `~/.boe/logs/`
    pub fn logs_dir() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("logs"))
    }

    /// Returns the per-chain RPC override file: `~/.boe/rpc.json`
    pub fn rpc_config_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("rpc.json"))
    }

    /// Ensures all required directories exist.
    pub fn ensure_dirs() -> Result<()> {
        let dirs = [Self::base_dir()?, Self::logs_dir()?];
        for dir in &dirs {
            if !dir.exists() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
            }
        }
        Ok(())
    }

    /// Loads config from disk, or creates the default file if missing.
    pub fn load() -> Result<Self> {
        Self::ensure_dirs()?;
        let path = Self::config_path()?;
        Self::load_from_path(&path)
    }

    /// Load config from a specific file path.
    ///
    /// A missing file is created with defaults. A file that cannot be parsed is
    /// left untouched and the defaults are used for this run.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to_path(path)?;
            info!("Created default config at {}", path.display());
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        match serde_json::from_str::<Self>(&content) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                Ok(config)
            }
            Err(e) => {
                warn!("Corrupt config file {}, using defaults: {e}", path.display());
                Ok(Self::default())
            }
        }
    }

    /// Save config to a specific file path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// The bounded receipt wait, or `None` when disabled.
    pub fn receipt_timeout(&self) -> Option<Duration> {
        (self.receipt_timeout_secs > 0).then(|| Duration::from_secs(self.receipt_timeout_secs))
    }

    pub fn min_resubmit_interval(&self) -> Duration {
        Duration::from_millis(self.min_resubmit_interval_ms)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = BoeConfig::default();
        assert_eq!(config.default_chain, "sepolia");
        assert_eq!(config.confirmations, 1);
        assert_eq!(config.token_decimals, 18);
        assert_eq!(config.receipt_timeout(), Some(Duration::from_secs(600)));
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.json");

        let config = BoeConfig::load_from_path(&path).unwrap();
        assert_eq!(config, BoeConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn save_and_reload() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");

        let mut config = BoeConfig::default();
        config.confirmations = 3;
        config.default_chain = "mainnet".into();
        config.save_to_path(&path).unwrap();

        let loaded = BoeConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded.confirmations, 3);
        assert_eq!(loaded.default_chain, "mainnet");
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{ "confirmations": 5 }"#).unwrap();

        let loaded = BoeConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded.confirmations, 5);
        assert_eq!(loaded.token_decimals, 18);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let loaded = BoeConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded, BoeConfig::default());
        // The broken file is left for the user to inspect.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn zero_timeout_disables_bounded_wait() {
        let config = BoeConfig {
            receipt_timeout_secs: 0,
            ..BoeConfig::default()
        };
        assert_eq!(config.receipt_timeout(), None);
    }

    #[test]
    fn poll_interval_never_zero() {
        let config = BoeConfig {
            poll_interval_secs: 0,
            ..BoeConfig::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }
}
