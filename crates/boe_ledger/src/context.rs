//! The explicit per-widget context: which chain, which endpoint, which
//! contract. Built once and handed to every widget constructor.

use boe_core::BoeConfig;

use crate::chain::{Chain, deployed_address};
use crate::contract::{Contract, bills_of_exchange};
use crate::error::LedgerError;
use crate::rpc::LedgerClient;
use crate::rpc_config::RpcConfigStore;
use crate::units::DEFAULT_TOKEN_DECIMALS;
use crate::watcher::{ConfirmationPolicy, ConfirmationWatcher};
use crate::writer::WriteOptions;

#[derive(Clone)]
pub struct LedgerContext {
    pub chain: Chain,
    pub client: LedgerClient,
    pub contract: Contract,
    pub decimals: u8,
    pub policy: ConfirmationPolicy,
    pub write_options: WriteOptions,
}

impl LedgerContext {
    pub fn new(chain: Chain, client: LedgerClient, contract: Contract) -> Self {
        Self {
            chain,
            client,
            contract,
            decimals: DEFAULT_TOKEN_DECIMALS,
            policy: ConfirmationPolicy::default(),
            write_options: WriteOptions::default(),
        }
    }

    /// Context for the Bills of Exchange deployment on `chain`, using the
    /// store's endpoint for that chain.
    pub fn for_chain(store: &RpcConfigStore, chain: Chain) -> Result<Self, LedgerError> {
        let address = deployed_address(chain).ok_or_else(|| {
            LedgerError::InvalidInput(format!(
                "Contract not deployed on {chain}. Switch to another chain"
            ))
        })?;
        let rpc = store
            .get_rpc(chain)
            .ok_or_else(|| LedgerError::InvalidInput(format!("no RPC endpoint configured for {chain}")))?;

        Ok(Self::new(chain, LedgerClient::http(rpc)?, bills_of_exchange(address)?))
    }

    /// Apply confirmation, resubmit and decimals settings from `config`.
    pub fn with_config(mut self, config: &BoeConfig) -> Self {
        self.decimals = config.token_decimals;
        self.policy = ConfirmationPolicy::from_config(config);
        self.write_options = WriteOptions::from_config(config);
        self
    }

    pub fn watcher(&self) -> ConfirmationWatcher {
        ConfirmationWatcher::new(self.client.clone(), self.policy.clone())
    }
}
