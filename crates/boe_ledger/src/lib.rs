//! Client-side interaction layer for the Bills of Exchange token contract.

pub mod bill;
pub mod chain;
pub mod context;
pub mod contract;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod reader;
pub mod rpc;
pub mod rpc_config;
pub mod signer;
pub mod transaction;
pub mod units;
pub mod validation;
pub mod watcher;
pub mod widgets;
pub mod writer;

pub use bill::{BillDetails, fetch_bill_details};
pub use chain::{Chain, ChainConfig, Explorer, deployed_address, get_chain_configs};
pub use context::LedgerContext;
pub use contract::{Contract, ContractCall, ContractMethod, FromDynValue, Mutability, bills_of_exchange};
pub use error::LedgerError;
pub use reader::{ReadAdapter, ReadOptions};
pub use rpc::{HttpTransport, LedgerClient, Transport, TransactionReceipt, TransactionRequest};
pub use rpc_config::{RpcConfig, RpcConfigStore};
pub use signer::{LocalKeySigner, NodeSigner, TransactionSigner};
pub use transaction::{TransactionRecord, TxStatus};
pub use units::{DEFAULT_TOKEN_DECIMALS, UnitsError, to_human, to_units};
pub use validation::{ValidationState, validate_address, validate_amount};
pub use watcher::{ConfirmationPolicy, ConfirmationWatcher, WatchHandle, WatchOutcome};
pub use widgets::{BalanceWidget, TransferWidget};
pub use writer::{WriteAdapter, WriteOptions};
