use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use alloy_primitives::Address;
use boe_core::BoeConfig;
use boe_ledger::Chain;
use boe_ledger::rpc_config::{RpcConfigStore, validate_url};
use boe_ledger::validation::validate_address;
use clap::Parser;

use crate::error::DeployError;

pub const ENV_TARGET_ADDRESS: &str = "ETH_DEV_ADDRESS";
pub const ENV_PRIVATE_KEY: &str = "ETH_DEV_PRIVATE_KEY";
pub const ENV_ETHERSCAN_API_KEY: &str = "ETHERSCAN_API_KEY";

/// Deploy the Bills of Exchange contract and verify its source.
#[derive(Debug, Clone, Parser)]
#[command(name = "boe-deploy", version, about, long_about = None)]
pub struct DeployArgs {
    /// Target network: `sepolia` or `mainnet` [default: `default_chain` from ~/.boe/config.json]
    #[arg(long)]
    pub network: Option<String>,

    /// Contract name inside the Hardhat project
    #[arg(long, default_value = "BillsOfExchange")]
    pub contract: String,

    /// Hardhat artifact JSON [default: artifacts/contracts/<CONTRACT>.sol/<CONTRACT>.json]
    #[arg(long)]
    pub artifact: Option<PathBuf>,

    /// Hardhat build-info JSON holding the solc standard-JSON input
    #[arg(long)]
    pub build_info: Option<PathBuf>,

    /// Where the deployment record is written
    #[arg(long, default_value = "artifacts")]
    pub out_dir: PathBuf,

    /// Blocks to wait for before the deployment counts as final
    #[arg(long, default_value_t = 3)]
    pub confirmations: u64,

    /// Seconds between receipt polls
    #[arg(long, default_value_t = 4)]
    pub poll_interval_secs: u64,

    /// Give up waiting for the receipt after this many seconds (0 = never)
    #[arg(long, default_value_t = 600)]
    pub timeout_secs: u64,

    /// RPC endpoint, overriding `<NETWORK>_RPC_URL` and ~/.boe/rpc.json
    #[arg(long)]
    pub rpc_url: Option<String>,

    /// Deploy only, skip explorer verification
    #[arg(long)]
    pub skip_verify: bool,
}

/// Used when neither `--network` nor the config file names one.
pub const DEFAULT_NETWORK: &str = "sepolia";

impl DeployArgs {
    /// Fill unset flags from the user's config file.
    pub fn with_defaults(mut self, config: &BoeConfig) -> Self {
        if self.network.is_none() {
            self.network = Some(config.default_chain.clone());
        }
        self
    }
}

/// Wrap `lookup` so that a missing `<NETWORK>_RPC_URL` falls back to the
/// custom endpoint saved in `store`.
pub fn with_rpc_overrides<L>(lookup: L, store: RpcConfigStore) -> impl Fn(&str) -> Option<String>
where
    L: Fn(&str) -> Option<String>,
{
    move |key| {
        lookup(key).or_else(|| {
            Chain::ALL
                .into_iter()
                .find(|chain| chain.rpc_env_var() == key)
                .and_then(|chain| store.custom_url(chain))
                .map(str::to_string)
        })
    }
}

/// Everything the procedure needs, resolved from flags and environment.
#[derive(Clone)]
pub struct DeployConfig {
    pub chain: Chain,
    pub rpc_url: String,
    /// Passed to the constructor as the initial owner.
    pub target_address: Address,
    pub private_key: String,
    pub etherscan_api_key: Option<String>,
    pub contract_name: String,
    pub artifact_path: PathBuf,
    pub build_info_path: Option<PathBuf>,
    pub out_dir: PathBuf,
    pub confirmations: u64,
    pub poll_interval: Duration,
    pub receipt_timeout: Option<Duration>,
    pub skip_verify: bool,
}

impl fmt::Debug for DeployConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployConfig")
            .field("chain", &self.chain)
            .field("rpc_url", &self.rpc_url)
            .field("target_address", &self.target_address)
            .field("private_key", &"<redacted>")
            .field("etherscan_api_key", &self.etherscan_api_key.as_ref().map(|_| "<redacted>"))
            .field("contract_name", &self.contract_name)
            .field("artifact_path", &self.artifact_path)
            .field("out_dir", &self.out_dir)
            .field("confirmations", &self.confirmations)
            .finish_non_exhaustive()
    }
}

impl DeployConfig {
    pub fn from_env(args: &DeployArgs) -> Result<Self, DeployError> {
        Self::from_lookup(args, |key| std::env::var(key).ok())
    }

    /// Resolve the configuration with `lookup` standing in for the process
    /// environment. Blank values count as missing.
    pub fn from_lookup(
        args: &DeployArgs,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, DeployError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let target = get(ENV_TARGET_ADDRESS).ok_or_else(|| {
            DeployError::Config(format!(
                "{ENV_TARGET_ADDRESS} is not set; it names the contract's initial owner"
            ))
        })?;
        let validation = validate_address(&target);
        let target_address = validation.address.ok_or_else(|| {
            DeployError::Config(format!("{ENV_TARGET_ADDRESS}: {}", validation.message))
        })?;

        let chain: Chain = args
            .network
            .as_deref()
            .unwrap_or(DEFAULT_NETWORK)
            .parse()
            .map_err(|e| DeployError::Config(format!("{e}")))?;

        let private_key = get(ENV_PRIVATE_KEY)
            .ok_or_else(|| DeployError::Config(format!("{ENV_PRIVATE_KEY} is not set")))?;

        let rpc_url = args
            .rpc_url
            .clone()
            .or_else(|| get(chain.rpc_env_var()))
            .ok_or_else(|| {
                DeployError::Config(format!(
                    "no RPC endpoint: set {} or pass --rpc-url",
                    chain.rpc_env_var()
                ))
            })?;
        if !validate_url(&rpc_url) {
            return Err(DeployError::Config(format!("invalid RPC URL: {rpc_url}")));
        }

        let artifact_path = args.artifact.clone().unwrap_or_else(|| {
            PathBuf::from("artifacts")
                .join("contracts")
                .join(format!("{}.sol", args.contract))
                .join(format!("{}.json", args.contract))
        });

        Ok(Self {
            chain,
            rpc_url,
            target_address,
            private_key,
            etherscan_api_key: get(ENV_ETHERSCAN_API_KEY),
            contract_name: args.contract.clone(),
            artifact_path,
            build_info_path: args.build_info.clone(),
            out_dir: args.out_dir.clone(),
            confirmations: args.confirmations.max(1),
            poll_interval: Duration::from_secs(args.poll_interval_secs.max(1)),
            receipt_timeout: (args.timeout_secs > 0).then(|| Duration::from_secs(args.timeout_secs)),
            skip_verify: args.skip_verify,
        })
    }
}
