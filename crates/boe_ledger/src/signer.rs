//! Wallet seam: something that can approve and broadcast a transaction.

use std::fmt;
use std::str::FromStr;

use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{Address, B256, Bytes, TxKind};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::LedgerError;
use crate::rpc::{LedgerClient, TransactionRequest};

/// Approves a transaction and hands it to the network.
///
/// `Ok(hash)` means the user approved and the transaction was broadcast.
/// A refusal is an `Err` whose display text is the wallet's own message.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    fn address(&self) -> Address;

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256, LedgerError>;
}

// ---------------------------------------------------------------------------
// NodeSigner
// ---------------------------------------------------------------------------

/// Delegates signing to the endpoint via `eth_sendTransaction`. The key lives
/// in the wallet (or the dev node's unlocked account), never in this process.
pub struct NodeSigner {
    client: LedgerClient,
    from: Address,
}

impl NodeSigner {
    pub fn new(client: LedgerClient, from: Address) -> Self {
        Self { client, from }
    }
}

#[async_trait]
impl TransactionSigner for NodeSigner {
    fn address(&self) -> Address {
        self.from
    }

    async fn send_transaction(&self, mut tx: TransactionRequest) -> Result<B256, LedgerError> {
        tx.from = Some(self.from);
        debug!(from = %self.from, to = ?tx.to, "requesting wallet signature");
        self.client.send_transaction(&tx).await
    }
}

// ---------------------------------------------------------------------------
// LocalKeySigner
// ---------------------------------------------------------------------------

/// Gas limit headroom over `eth_estimateGas`, in percent.
const GAS_HEADROOM_PERCENT: u64 = 20;

/// Signs EIP-1559 transactions with an in-process private key.
pub struct LocalKeySigner {
    key: PrivateKeySigner,
    client: LedgerClient,
    chain_id: u64,
}

impl fmt::Debug for LocalKeySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalKeySigner")
            .field("address", &self.key.address())
            .field("chain_id", &self.chain_id)
            .finish_non_exhaustive()
    }
}

impl LocalKeySigner {
    pub fn new(key: PrivateKeySigner, client: LedgerClient, chain_id: u64) -> Self {
        Self {
            key,
            client,
            chain_id,
        }
    }

    /// Parse a hex private key, with or without `0x`. The key itself never
    /// appears in the error.
    pub fn from_hex(private_key: &str, client: LedgerClient, chain_id: u64) -> Result<Self, LedgerError> {
        let trimmed = private_key.trim();
        let hex = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let key = PrivateKeySigner::from_str(hex)
            .map_err(|_| LedgerError::InvalidInput("private key is not 32 bytes of hex".into()))?;
        Ok(Self::new(key, client, chain_id))
    }

    /// Fill nonce, gas limit and fees for `request`.
    pub async fn prepare(&self, request: TransactionRequest) -> Result<TxEip1559, LedgerError> {
        let from = self.key.address();
        let nonce = self.client.transaction_count(from).await?;

        let estimate_request = TransactionRequest {
            from: Some(from),
            ..request.clone()
        };
        let gas = match request.gas {
            Some(gas) => gas.to::<u64>(),
            None => {
                let estimate = self.client.estimate_gas(&estimate_request).await?;
                estimate.saturating_add(estimate.saturating_mul(GAS_HEADROOM_PERCENT) / 100)
            }
        };
        let fees = self.client.fee_estimate().await?;

        Ok(TxEip1559 {
            chain_id: self.chain_id,
            nonce,
            gas_limit: gas,
            max_fee_per_gas: fees.max_fee_per_gas,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
            to: request.to.map_or(TxKind::Create, TxKind::Call),
            value: request.value.unwrap_or_default(),
            access_list: Default::default(),
            input: request.data,
        })
    }

    /// Sign `tx` and return its EIP-2718 envelope bytes.
    pub fn sign(&self, tx: TxEip1559) -> Result<Bytes, LedgerError> {
        let signature = self
            .key
            .sign_hash_sync(&tx.signature_hash())
            .map_err(|e| LedgerError::Signer(e.to_string()))?;
        let envelope = TxEnvelope::from(tx.into_signed(signature));
        Ok(envelope.encoded_2718().into())
    }
}

#[async_trait]
impl TransactionSigner for LocalKeySigner {
    fn address(&self) -> Address {
        self.key.address()
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256, LedgerError> {
        let prepared = self.prepare(tx).await?;
        info!(
            from = %self.key.address(),
            nonce = prepared.nonce,
            gas_limit = prepared.gas_limit,
            "broadcasting signed transaction"
        );
        let raw = self.sign(prepared)?;
        self.client.send_raw_transaction(raw).await
    }
}
