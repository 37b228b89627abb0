use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, B256, address};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Networks the Bills of Exchange contract is deployed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Mainnet,
    Sepolia,
}

impl Chain {
    pub const ALL: [Chain; 2] = [Chain::Mainnet, Chain::Sepolia];

    /// Human-readable label for the chain.
    pub fn label(&self) -> &'static str {
        match self {
            Chain::Mainnet => "Ethereum Mainnet",
            Chain::Sepolia => "Sepolia",
        }
    }

    /// Short network name, as used on the command line and in file names.
    pub fn name(&self) -> &'static str {
        match self {
            Chain::Mainnet => "mainnet",
            Chain::Sepolia => "sepolia",
        }
    }

    /// EIP-155 chain id.
    pub fn chain_id(&self) -> u64 {
        match self {
            Chain::Mainnet => 1,
            Chain::Sepolia => 11_155_111,
        }
    }

    pub fn from_chain_id(id: u64) -> Result<Self, LedgerError> {
        Chain::ALL
            .into_iter()
            .find(|c| c.chain_id() == id)
            .ok_or(LedgerError::UnsupportedChain(id))
    }

    /// Environment variable holding the RPC endpoint for deployments.
    pub fn rpc_env_var(&self) -> &'static str {
        match self {
            Chain::Mainnet => "MAINNET_RPC_URL",
            Chain::Sepolia => "SEPOLIA_RPC_URL",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Chain {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "ethereum" | "1" => Ok(Chain::Mainnet),
            "sepolia" | "11155111" => Ok(Chain::Sepolia),
            other => Err(LedgerError::InvalidInput(format!("unknown network: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Deployments
// ---------------------------------------------------------------------------

const SEPOLIA_BILLS_OF_EXCHANGE: Address = address!("dd5d36c9cce7893ebfc35c4390511281cab3da85");

/// Address of the Bills of Exchange contract on `chain`, or `None` if it has
/// not been deployed there yet.
pub fn deployed_address(chain: Chain) -> Option<Address> {
    let addr = match chain {
        Chain::Mainnet => Address::ZERO,
        Chain::Sepolia => SEPOLIA_BILLS_OF_EXCHANGE,
    };
    (!addr.is_zero()).then_some(addr)
}

// ---------------------------------------------------------------------------
// Block explorers
// ---------------------------------------------------------------------------

/// Block explorers that index the supported chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Explorer {
    Etherscan,
    Blockscout,
}

impl Explorer {
    pub const ALL: [Explorer; 2] = [Explorer::Etherscan, Explorer::Blockscout];

    pub fn label(&self) -> &'static str {
        match self {
            Explorer::Etherscan => "Etherscan",
            Explorer::Blockscout => "Blockscout",
        }
    }

    /// Web UI root, always with a trailing slash.
    pub fn base_url(&self, chain: Chain) -> &'static str {
        match (self, chain) {
            (Explorer::Etherscan, Chain::Mainnet) => "https://etherscan.io/",
            (Explorer::Etherscan, Chain::Sepolia) => "https://sepolia.etherscan.io/",
            (Explorer::Blockscout, Chain::Mainnet) => "https://eth.blockscout.com/",
            (Explorer::Blockscout, Chain::Sepolia) => "https://eth-sepolia.blockscout.com/",
        }
    }

    /// Etherscan-compatible HTTP API endpoint used for source verification.
    pub fn api_url(&self, chain: Chain) -> String {
        match self {
            // Etherscan's v2 API is a single host; the chain goes in `chainid`.
            Explorer::Etherscan => "https://api.etherscan.io/v2/api".to_string(),
            Explorer::Blockscout => format!("{}api", self.base_url(chain)),
        }
    }

    pub fn tx_url(&self, chain: Chain, hash: &B256) -> String {
        format!("{}tx/{hash}", self.base_url(chain))
    }

    pub fn address_url(&self, chain: Chain, address: &Address) -> String {
        format!("{}address/{address}", self.base_url(chain))
    }
}

impl fmt::Display for Explorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Chain configuration
// ---------------------------------------------------------------------------

/// Network-specific defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    pub explorer_url: String,
}

/// Returns default configurations for all supported networks.
pub fn get_chain_configs() -> HashMap<Chain, ChainConfig> {
    let mut configs = HashMap::new();

    configs.insert(
        Chain::Mainnet,
        ChainConfig {
            name: Chain::Mainnet.label().to_string(),
            chain_id: Chain::Mainnet.chain_id(),
            rpc_url: "https://eth.llamarpc.com".to_string(),
            explorer_url: Explorer::Etherscan.base_url(Chain::Mainnet).to_string(),
        },
    );

    configs.insert(
        Chain::Sepolia,
        ChainConfig {
            name: Chain::Sepolia.label().to_string(),
            chain_id: Chain::Sepolia.chain_id(),
            rpc_url: "https://ethereum-sepolia-rpc.publicnode.com".to_string(),
            explorer_url: Explorer::Etherscan.base_url(Chain::Sepolia).to_string(),
        },
    );

    configs
}
