use std::process::ExitCode;

use boe_core::{BoeConfig, logging};
use boe_deploy::{DeployArgs, DeployEnvironment, DeployError, run_with, with_rpc_overrides};
use boe_ledger::RpcConfigStore;
use clap::Parser;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let config = BoeConfig::load().unwrap_or_else(|e| {
        eprintln!("Using default settings: {e:#}");
        BoeConfig::default()
    });
    let args = DeployArgs::parse().with_defaults(&config);

    // Keep the guard alive so buffered file logs are flushed on exit.
    let _log_guard = match logging::init_logging(&config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Logging disabled: {e:#}");
            None
        }
    };

    info!("boe-deploy v{}", env!("CARGO_PKG_VERSION"));

    let rpc_store = match BoeConfig::rpc_config_path() {
        Ok(path) => RpcConfigStore::load_or_default(&path),
        Err(e) => {
            warn!("no RPC config file: {e:#}");
            RpcConfigStore::with_defaults()
        }
    };
    let lookup = with_rpc_overrides(|key: &str| std::env::var(key).ok(), rpc_store);

    match run_with(&args, lookup, DeployEnvironment::connect).await {
        Ok(summary) => {
            let record = &summary.record;
            info!(
                address = %record.contract_address,
                tx_hash = %record.deployment_tx,
                chain = %record.chain_name,
                "deployment complete"
            );
            for outcome in &summary.verifications {
                match &outcome.result {
                    Ok(status) => info!(provider = %outcome.provider, ?status, "verification succeeded"),
                    Err(e) => warn!(provider = %outcome.provider, "verification failed: {e}"),
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            if matches!(e, DeployError::Config(_)) {
                eprintln!("{e}");
            }
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
