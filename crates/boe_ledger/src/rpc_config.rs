use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::chain::{Chain, get_chain_configs};

/// Configuration for a single RPC endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    pub chain: Chain,
    pub url: String,
    pub is_custom: bool,
    pub timeout_secs: u64,
}

impl RpcConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Manages per-chain RPC endpoint configuration with custom override support.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfigStore {
    configs: HashMap<Chain, RpcConfig>,
}

impl RpcConfigStore {
    /// Create a store populated with default RPC URLs from [`get_chain_configs`].
    pub fn with_defaults() -> Self {
        let configs = get_chain_configs()
            .into_iter()
            .map(|(chain, cc)| {
                let rpc = RpcConfig {
                    chain,
                    url: cc.rpc_url,
                    is_custom: false,
                    timeout_secs: DEFAULT_TIMEOUT_SECS,
                };
                (chain, rpc)
            })
            .collect();

        Self { configs }
    }

    /// Get the RPC configuration for a chain.
    pub fn get_rpc(&self, chain: Chain) -> Option<&RpcConfig> {
        self.configs.get(&chain)
    }

    /// The user's own endpoint for `chain`, if the store has one.
    pub fn custom_url(&self, chain: Chain) -> Option<&str> {
        self.configs
            .get(&chain)
            .filter(|rpc| rpc.is_custom)
            .map(|rpc| rpc.url.as_str())
    }

    /// Load the store from disk, or return defaults if the file is missing or
    /// corrupt. Chains missing from the file, and entries whose URL is not
    /// http(s), keep their default entry.
    pub fn load_or_default(path: &Path) -> Self {
        let mut store = Self::with_defaults();
        if !path.exists() {
            return store;
        }
        let loaded = std::fs::read_to_string(path)
            .context("Cannot read RPC config file")
            .and_then(|data| {
                serde_json::from_str::<RpcConfigStore>(&data).context("Corrupt RPC config file")
            });
        match loaded {
            Ok(loaded) => {
                for (chain, mut rpc) in loaded.configs {
                    if !validate_url(&rpc.url) {
                        warn!(%chain, url = %rpc.url, "ignoring invalid RPC URL");
                        continue;
                    }
                    rpc.chain = chain;
                    rpc.timeout_secs = rpc.timeout_secs.max(1);
                    store.configs.insert(chain, rpc);
                }
                debug!(path = %path.display(), "loaded RPC config");
            }
            Err(e) => warn!("{e:#}, using defaults"),
        }
        store
    }
}

impl Default for RpcConfigStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Validate that a URL is well-formed and uses HTTP or HTTPS.
pub fn validate_url(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            (scheme == "http" || scheme == "https") && parsed.host().is_some()
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_all_chains() {
        let store = RpcConfigStore::with_defaults();
        for chain in Chain::ALL {
            let rpc = store.get_rpc(chain).unwrap();
            assert!(!rpc.is_custom);
            assert_eq!(rpc.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        }
    }

    #[test]
    fn custom_endpoint_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rpc.json");
        std::fs::write(
            &path,
            r#"{ "configs": { "sepolia": {
                "chain": "sepolia",
                "url": "https://sepolia.example.org",
                "is_custom": true,
                "timeout_secs": 5
            } } }"#,
        )
        .unwrap();

        let loaded = RpcConfigStore::load_or_default(&path);
        let rpc = loaded.get_rpc(Chain::Sepolia).unwrap();
        assert_eq!(rpc.url, "https://sepolia.example.org");
        assert_eq!(rpc.timeout(), Duration::from_secs(5));
        assert_eq!(loaded.custom_url(Chain::Sepolia), Some("https://sepolia.example.org"));
        assert_eq!(loaded.custom_url(Chain::Mainnet), None);
        assert!(loaded.get_rpc(Chain::Mainnet).is_some());
    }

    #[test]
    fn invalid_url_in_file_keeps_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rpc.json");
        std::fs::write(
            &path,
            r#"{ "configs": { "mainnet": {
                "chain": "mainnet",
                "url": "ftp://files.example.com",
                "is_custom": true,
                "timeout_secs": 0
            } } }"#,
        )
        .unwrap();

        let loaded = RpcConfigStore::load_or_default(&path);
        assert_eq!(loaded.custom_url(Chain::Mainnet), None);
        assert_eq!(
            loaded.get_rpc(Chain::Mainnet).unwrap().url,
            RpcConfigStore::with_defaults().get_rpc(Chain::Mainnet).unwrap().url
        );
    }

    #[test]
    fn missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = RpcConfigStore::load_or_default(&dir.path().join("absent.json"));
        assert!(Chain::ALL.into_iter().all(|c| loaded.custom_url(c).is_none()));
    }

    #[test]
    fn load_corrupt_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rpc.json");
        std::fs::write(&path, "[1, 2").unwrap();

        let loaded = RpcConfigStore::load_or_default(&path);
        assert!(!loaded.get_rpc(Chain::Sepolia).unwrap().is_custom);
    }

    #[test]
    fn validate_url_cases() {
        assert!(validate_url("https://rpc.example.com"));
        assert!(validate_url("http://localhost:8545"));
        assert!(!validate_url(""));
        assert!(!validate_url("not a url"));
        assert!(!validate_url("file:///etc/passwd"));
    }
}
