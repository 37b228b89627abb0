//! Deploys the Bills of Exchange contract and verifies its source on block
//! explorers.

pub mod artifact;
pub mod config;
pub mod deploy;
pub mod error;
pub mod record;
pub mod verify;

pub use config::{DeployArgs, DeployConfig, with_rpc_overrides};
pub use deploy::{DeployEnvironment, DeploySummary, VerificationOutcome, run, run_with, verify_all};
pub use error::DeployError;
pub use record::DeploymentRecord;
pub use verify::{ExplorerVerifier, VerificationRequest, VerificationStatus, Verifier};
