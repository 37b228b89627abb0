//! The deployment procedure: load, broadcast, confirm, record, verify.

use std::path::PathBuf;
use std::sync::Arc;

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::Bytes;
use boe_ledger::contract::encode_constructor_args;
use boe_ledger::watcher::CancelSignal;
use boe_ledger::{
    Chain, ConfirmationPolicy, ConfirmationWatcher, HttpTransport, LedgerClient, LocalKeySigner,
    TransactionRequest, TransactionSigner, WatchOutcome,
};
use tracing::{error, info, warn};

use crate::artifact::{BuildInfo, HardhatArtifact};
use crate::config::{DeployArgs, DeployConfig};
use crate::error::DeployError;
use crate::record::DeploymentRecord;
use crate::verify::{ExplorerVerifier, VerificationRequest, VerificationStatus, Verifier};

/// Network-facing collaborators, built only once the configuration is valid.
pub struct DeployEnvironment {
    pub client: LedgerClient,
    pub signer: Arc<dyn TransactionSigner>,
    pub verifiers: Vec<Box<dyn Verifier>>,
}

impl DeployEnvironment {
    /// HTTP transport, local key signer, then Etherscan and Blockscout.
    pub fn connect(config: &DeployConfig) -> Result<Self, DeployError> {
        let transport = HttpTransport::new(config.rpc_url.clone(), std::time::Duration::from_secs(30))
            .map_err(|e| DeployError::Config(e.to_string()))?;
        let client = LedgerClient::new(Arc::new(transport));
        let signer = LocalKeySigner::from_hex(&config.private_key, client.clone(), config.chain.chain_id())
            .map_err(|e| DeployError::Config(format!("ETH_DEV_PRIVATE_KEY: {e}")))?;

        let verifiers: Vec<Box<dyn Verifier>> = vec![
            Box::new(
                ExplorerVerifier::etherscan(config.chain, config.etherscan_api_key.clone())
                    .map_err(|e| DeployError::Config(e.to_string()))?,
            ),
            Box::new(
                ExplorerVerifier::blockscout(config.chain).map_err(|e| DeployError::Config(e.to_string()))?,
            ),
        ];

        Ok(Self {
            client,
            signer: Arc::new(signer),
            verifiers,
        })
    }
}

#[derive(Debug)]
pub struct VerificationOutcome {
    pub provider: String,
    pub result: Result<VerificationStatus, String>,
}

impl VerificationOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug)]
pub struct DeploySummary {
    pub record: DeploymentRecord,
    /// `None` when the record could not be written.
    pub record_path: Option<PathBuf>,
    pub verifications: Vec<VerificationOutcome>,
}

/// Resolve configuration, then connect, then run. `connect` is not called
/// when the configuration is incomplete.
pub async fn run_with<L, C>(args: &DeployArgs, lookup: L, connect: C) -> Result<DeploySummary, DeployError>
where
    L: Fn(&str) -> Option<String>,
    C: FnOnce(&DeployConfig) -> Result<DeployEnvironment, DeployError>,
{
    let config = DeployConfig::from_lookup(args, lookup)?;
    let env = connect(&config)?;
    run(&config, env).await
}

/// Run the procedure against an already-connected environment.
pub async fn run(config: &DeployConfig, env: DeployEnvironment) -> Result<DeploySummary, DeployError> {
    let artifact = HardhatArtifact::load(&config.artifact_path)
        .map_err(|e| DeployError::Deployment(format!("{e:#}")))?;
    let creation_code = artifact
        .creation_code()
        .map_err(|e| DeployError::Deployment(format!("{e:#}")))?;

    let input_types = artifact.constructor_inputs();
    let input_types: Vec<&str> = input_types.iter().map(String::as_str).collect();
    let constructor_args = encode_constructor_args(&input_types, &[DynSolValue::Address(config.target_address)])?;

    let chain_id = env.client.chain_id().await?;
    if chain_id != config.chain.chain_id() {
        let found = match Chain::from_chain_id(chain_id) {
            Ok(chain) => format!("{chain} (chain id {chain_id})"),
            Err(e) => e.to_string(),
        };
        return Err(DeployError::Deployment(format!(
            "endpoint is on {found}, expected {} (chain id {})",
            config.chain,
            config.chain.chain_id()
        )));
    }

    let record = deploy_contract(config, &env, &creation_code, &constructor_args).await?;

    let record_path = match record.persist(&config.out_dir) {
        Ok(path) => {
            info!(path = %path.display(), "deployment record written");
            Some(path)
        }
        Err(e) => {
            error!("failed to write deployment record: {e:#}");
            None
        }
    };

    let verifications = if config.skip_verify {
        info!("skipping source verification");
        Vec::new()
    } else {
        match verification_request(config, &artifact, &record, constructor_args) {
            Ok(request) => verify_all(&env.verifiers, &request).await,
            Err(e) => {
                warn!("cannot verify source: {e:#}");
                env.verifiers
                    .iter()
                    .map(|v| VerificationOutcome {
                        provider: v.name().to_string(),
                        result: Err(format!("{e:#}")),
                    })
                    .collect()
            }
        }
    };

    Ok(DeploySummary {
        record,
        record_path,
        verifications,
    })
}

/// Broadcast the creation transaction and wait for the configured depth.
async fn deploy_contract(
    config: &DeployConfig,
    env: &DeployEnvironment,
    creation_code: &Bytes,
    constructor_args: &Bytes,
) -> Result<DeploymentRecord, DeployError> {
    let mut data = creation_code.to_vec();
    data.extend_from_slice(constructor_args);

    info!(
        chain = %config.chain,
        contract = %config.contract_name,
        deployer = %env.signer.address(),
        owner = %config.target_address,
        "deploying contract"
    );
    let tx_hash = env
        .signer
        .send_transaction(TransactionRequest {
            data: data.into(),
            ..Default::default()
        })
        .await?;
    info!(tx_hash = %tx_hash, confirmations = config.confirmations, "deployment broadcast, waiting for confirmations");

    let policy = ConfirmationPolicy {
        confirmations: config.confirmations,
        poll_interval: config.poll_interval,
        timeout: config.receipt_timeout,
    };
    let watcher = ConfirmationWatcher::new(env.client.clone(), policy);

    let receipt = match watcher.wait(tx_hash, CancelSignal::never()).await {
        WatchOutcome::Confirmed(receipt) => receipt,
        WatchOutcome::Failed(reason) => return Err(DeployError::Deployment(reason)),
        WatchOutcome::TimedOut => {
            return Err(DeployError::Deployment(format!(
                "no confirmed receipt for {tx_hash} before the deadline"
            )));
        }
        WatchOutcome::Cancelled => {
            return Err(DeployError::Deployment("confirmation wait cancelled".into()));
        }
    };

    let address = receipt
        .contract_address
        .ok_or_else(|| DeployError::Deployment(format!("receipt for {tx_hash} has no contract address")))?;
    info!(address = %address, "contract deployed");

    Ok(DeploymentRecord::new(
        &config.contract_name,
        config.chain,
        address,
        tx_hash,
        receipt.block().unwrap_or_default(),
    ))
}

fn verification_request(
    config: &DeployConfig,
    artifact: &HardhatArtifact,
    record: &DeploymentRecord,
    constructor_args: Bytes,
) -> anyhow::Result<VerificationRequest> {
    let path = config
        .build_info_path
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("no --build-info given"))?;
    let build_info = BuildInfo::load(path)?;

    Ok(VerificationRequest {
        chain: config.chain,
        address: record.contract_address,
        contract_name: artifact.fully_qualified_name(),
        compiler_version: build_info.compiler_version(),
        standard_json_input: build_info.standard_json_input()?,
        constructor_args,
    })
}

/// Try every verifier in order. A failure is logged and recorded, and the
/// next verifier still runs.
pub async fn verify_all(
    verifiers: &[Box<dyn Verifier>],
    request: &VerificationRequest,
) -> Vec<VerificationOutcome> {
    let mut outcomes = Vec::with_capacity(verifiers.len());
    for verifier in verifiers {
        let provider = verifier.name().to_string();
        let result = match verifier.verify(request).await {
            Ok(status) => {
                info!(provider = %provider, ?status, "source verified");
                Ok(status)
            }
            Err(e) => {
                error!(provider = %provider, "verification failed: {e:#}");
                Err(format!("{e:#}"))
            }
        };
        outcomes.push(VerificationOutcome { provider, result });
    }
    outcomes
}
