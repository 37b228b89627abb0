//! JSON-RPC plumbing: the [`Transport`] seam, its HTTP implementation, and a
//! typed [`LedgerClient`] on top.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, B256, Bytes, U64, U128, U256};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::LedgerError;
use crate::rpc_config::{RpcConfig, validate_url};

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// A JSON-RPC endpoint. Returns the `result` member on success.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, LedgerError>;
}

/// JSON-RPC 2.0 over HTTP POST.
pub struct HttpTransport {
    url: String,
    client: Client,
    timeout: Duration,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, LedgerError> {
        let url = url.into();
        if !validate_url(&url) {
            return Err(LedgerError::InvalidInput(format!("invalid RPC URL: {url}")));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url,
            client,
            timeout,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn from_config(config: &RpcConfig) -> Result<Self, LedgerError> {
        Self::new(config.url.clone(), config.timeout())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn request_error(&self, err: reqwest::Error) -> LedgerError {
        if err.is_timeout() {
            LedgerError::Timeout(self.timeout)
        } else {
            LedgerError::from(err)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, "rpc request");

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.request_error(e))?;

        if !status.is_success() {
            return Err(LedgerError::Transport(format!("HTTP {status}: {text}")));
        }
        parse_response(&text)
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Unwrap a JSON-RPC response body into its `result`, or the remote error.
pub(crate) fn parse_response(text: &str) -> Result<Value, LedgerError> {
    let envelope: RpcResponse = serde_json::from_str(text)
        .map_err(|e| LedgerError::Decode(format!("malformed JSON-RPC response: {e}")))?;

    if let Some(err) = envelope.error {
        return Err(LedgerError::Rpc {
            code: err.code,
            message: err.message,
        });
    }
    Ok(envelope.result.unwrap_or(Value::Null))
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// An unsigned transaction as sent to `eth_sendTransaction` / `eth_estimateGas`.
/// `to == None` creates a contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(default)]
    pub data: Bytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<U64>,
}

/// The receipt fields this crate cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(default)]
    pub block_number: Option<U64>,
    /// `0x1` success, `0x0` reverted. Absent on pre-Byzantium chains.
    #[serde(default)]
    pub status: Option<U64>,
    #[serde(default)]
    pub contract_address: Option<Address>,
    #[serde(default)]
    pub gas_used: Option<U256>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status.is_none_or(|s| s == U64::from(1))
    }

    pub fn block(&self) -> Option<u64> {
        self.block_number.map(|b| b.to::<u64>())
    }
}

/// EIP-1559 fee caps in wei.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEstimate {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockHeader {
    #[serde(default)]
    base_fee_per_gas: Option<U128>,
}

// ---------------------------------------------------------------------------
// LedgerClient
// ---------------------------------------------------------------------------

/// Typed helpers over a shared [`Transport`]. Cheap to clone.
#[derive(Clone)]
pub struct LedgerClient {
    transport: Arc<dyn Transport>,
}

impl LedgerClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Client for the endpoint described by `config`.
    pub fn http(config: &RpcConfig) -> Result<Self, LedgerError> {
        Ok(Self::new(Arc::new(HttpTransport::from_config(config)?)))
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Issue `method` and decode the result into `T`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, LedgerError> {
        let value = self.transport.request(method, params).await?;
        serde_json::from_value(value).map_err(|e| LedgerError::Decode(format!("{method}: {e}")))
    }

    pub async fn chain_id(&self) -> Result<u64, LedgerError> {
        let id: U64 = self.request("eth_chainId", json!([])).await?;
        Ok(id.to::<u64>())
    }

    pub async fn block_number(&self) -> Result<u64, LedgerError> {
        let number: U64 = self.request("eth_blockNumber", json!([])).await?;
        Ok(number.to::<u64>())
    }

    /// `eth_call` against the latest block.
    pub async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, LedgerError> {
        self.request("eth_call", json!([{ "to": to, "data": data }, "latest"]))
            .await
    }

    /// `None` while the transaction is unknown or not yet mined.
    pub async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, LedgerError> {
        self.request("eth_getTransactionReceipt", json!([hash])).await
    }

    /// Next nonce for `address`, counting pending transactions.
    pub async fn transaction_count(&self, address: Address) -> Result<u64, LedgerError> {
        let count: U64 = self
            .request("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        Ok(count.to::<u64>())
    }

    pub async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64, LedgerError> {
        let gas: U64 = self.request("eth_estimateGas", json!([tx])).await?;
        Ok(gas.to::<u64>())
    }

    /// Fee caps of `2 * base_fee + tip`, falling back to `eth_gasPrice` on
    /// chains without a base fee.
    pub async fn fee_estimate(&self) -> Result<FeeEstimate, LedgerError> {
        let tip: U128 = self.request("eth_maxPriorityFeePerGas", json!([])).await?;
        let tip = tip.to::<u128>();

        let header: Option<BlockHeader> = self
            .request("eth_getBlockByNumber", json!(["latest", false]))
            .await?;
        let base_fee = header.and_then(|h| h.base_fee_per_gas);

        let max_fee_per_gas = match base_fee {
            Some(base) => base.to::<u128>().saturating_mul(2).saturating_add(tip),
            None => {
                let price: U128 = self.request("eth_gasPrice", json!([])).await?;
                price.to::<u128>().max(tip)
            }
        };

        Ok(FeeEstimate {
            max_fee_per_gas,
            max_priority_fee_per_gas: tip,
        })
    }

    pub async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, LedgerError> {
        self.request("eth_sendRawTransaction", json!([raw])).await
    }

    /// Hand the transaction to the endpoint's own account management (a
    /// browser wallet or an unlocked development node) for approval.
    pub async fn send_transaction(&self, tx: &TransactionRequest) -> Result<B256, LedgerError> {
        self.request("eth_sendTransaction", json!([tx])).await
    }
}
