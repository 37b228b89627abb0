//! The JSON record written after a successful deployment.

use std::path::{Path, PathBuf};

use alloy_primitives::{Address, B256};
use boe_ledger::Chain;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numeric ledger values are strings so the file never loses precision in
/// tools that parse JSON numbers as doubles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub contract_name: String,
    pub chain_name: String,
    pub chain_id: String,
    pub contract_address: Address,
    pub deployment_tx: B256,
    pub block_number: String,
    pub time: DateTime<Utc>,
}

impl DeploymentRecord {
    pub fn new(
        contract_name: &str,
        chain: Chain,
        contract_address: Address,
        deployment_tx: B256,
        block_number: u64,
    ) -> Self {
        Self {
            contract_name: contract_name.to_string(),
            chain_name: chain.name().to_string(),
            chain_id: chain.chain_id().to_string(),
            contract_address,
            deployment_tx,
            block_number: block_number.to_string(),
            time: Utc::now(),
        }
    }

    /// `<unix_millis>_<chain>_<address>.json`
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}.json",
            self.time.timestamp_millis(),
            self.chain_name,
            self.contract_address
        )
    }

    /// Write the record as pretty JSON under `dir`, creating it if needed.
    pub fn persist(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }
}
