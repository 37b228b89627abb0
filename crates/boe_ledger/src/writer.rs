//! Write adapter: drives one state-changing call through wallet approval,
//! broadcast and confirmation, one submission at a time.

use std::sync::Arc;
use std::time::Duration;

use alloy_dyn_abi::DynSolValue;
use boe_core::BoeConfig;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::contract::{Contract, ContractCall};
use crate::error::LedgerError;
use crate::rpc::TransactionRequest;
use crate::signer::TransactionSigner;
use crate::transaction::{TransactionRecord, TxStatus};
use crate::validation::{validate_address, validate_amount};
use crate::watcher::{CancelHandle, ConfirmationWatcher, WatchOutcome, cancel_pair};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Minimum gap between two submissions, including failed ones.
    pub min_resubmit_interval: Duration,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            min_resubmit_interval: Duration::from_millis(1500),
        }
    }
}

impl WriteOptions {
    pub fn from_config(config: &BoeConfig) -> Self {
        Self {
            min_resubmit_interval: config.min_resubmit_interval(),
        }
    }
}

struct WriteState {
    record: TransactionRecord,
    last_attempt: Option<Instant>,
    /// Bumped on every submit and clear; late results from an older attempt
    /// are dropped.
    attempt: u64,
    cancel: Option<CancelHandle>,
}

/// Resets the record if the future driving an in-flight attempt is dropped
/// before it stores its result.
struct InFlightGuard<'a> {
    state: &'a Mutex<WriteState>,
    attempt: u64,
    armed: bool,
}

impl InFlightGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.state.lock();
        if state.attempt == self.attempt && state.record.is_in_flight() {
            debug!(status = state.record.status.label(), "in-flight write abandoned");
            state.cancel = None;
            state.attempt += 1;
            state.record = TransactionRecord::new();
        }
    }
}

pub struct WriteAdapter {
    signer: Arc<dyn TransactionSigner>,
    options: WriteOptions,
    state: Mutex<WriteState>,
}

impl WriteAdapter {
    pub fn new(signer: Arc<dyn TransactionSigner>, options: WriteOptions) -> Self {
        Self {
            signer,
            options,
            state: Mutex::new(WriteState {
                record: TransactionRecord::new(),
                last_attempt: None,
                attempt: 0,
                cancel: None,
            }),
        }
    }

    pub fn record(&self) -> TransactionRecord {
        self.state.lock().record.clone()
    }

    pub fn status(&self) -> TxStatus {
        self.state.lock().record.status
    }

    pub fn is_busy(&self) -> bool {
        self.status().is_in_flight()
    }

    /// Submit `call` through the signer.
    ///
    /// `Err` means nothing was sent: another submission is in flight, the
    /// previous attempt was too recent, the method is read-only, or the call
    /// could not be encoded. A wallet rejection is `Ok` with the record in
    /// `Failed`.
    ///
    /// Dropping the returned future before the wallet answers resets the
    /// record to `NotSubmitted`.
    pub async fn submit(&self, call: &ContractCall) -> Result<TransactionRecord, LedgerError> {
        if call.method.mutability().is_read_only() {
            return Err(LedgerError::Abi(format!(
                "{} is read-only and cannot be sent as a transaction",
                call.method.signature()
            )));
        }
        let request = call.to_request(Some(self.signer.address()))?;
        self.submit_request(request).await
    }

    pub async fn submit_request(
        &self,
        request: TransactionRequest,
    ) -> Result<TransactionRecord, LedgerError> {
        let attempt = {
            let mut state = self.state.lock();
            if state.record.is_in_flight() {
                return Err(LedgerError::SubmissionInFlight);
            }
            let now = Instant::now();
            if let Some(last) = state.last_attempt {
                let elapsed = now.duration_since(last);
                if elapsed < self.options.min_resubmit_interval {
                    return Err(LedgerError::RateLimited {
                        retry_after: self.options.min_resubmit_interval - elapsed,
                    });
                }
            }

            state.last_attempt = Some(now);
            state.attempt += 1;
            state.record = TransactionRecord::new();
            state.record.transition(TxStatus::PendingWalletConfirmation);
            state.attempt
        };

        let guard = InFlightGuard {
            state: &self.state,
            attempt,
            armed: true,
        };
        info!(to = ?request.to, "awaiting wallet confirmation");
        let result = self.signer.send_transaction(request).await;
        guard.disarm();

        let mut state = self.state.lock();
        if state.attempt != attempt {
            return Ok(state.record.clone());
        }
        match result {
            Ok(hash) => {
                state.record.hash = Some(hash);
                state.record.transition(TxStatus::Submitted);
                info!(tx_hash = %hash, "transaction submitted");
            }
            Err(e) => {
                warn!(error = %e, "wallet did not submit transaction");
                state.record.fail(e.to_string());
            }
        }
        Ok(state.record.clone())
    }

    /// Validate user input and submit `transfer(to, amount)`. Invalid input
    /// never reaches the signer.
    pub async fn transfer(
        &self,
        contract: &Contract,
        to: &str,
        amount: &str,
        decimals: u8,
    ) -> Result<TransactionRecord, LedgerError> {
        let to = validate_address(to);
        let Some(recipient) = to.address else {
            return Err(LedgerError::InvalidInput(to.message));
        };
        let amount = validate_amount(amount, decimals);
        let Some(units) = amount.units.filter(|_| amount.is_valid()) else {
            return Err(LedgerError::InvalidInput(amount.message));
        };

        let call = contract.call(
            "transfer",
            vec![DynSolValue::Address(recipient), DynSolValue::Uint(units, 256)],
        )?;
        self.submit(&call).await
    }

    /// Follow a `Submitted` transaction to a terminal state. Any other status
    /// is returned unchanged.
    ///
    /// Dropping the returned future stops polling and resets the record to
    /// `NotSubmitted`, as [`Self::clear`] does.
    pub async fn await_confirmation(&self, watcher: &ConfirmationWatcher) -> TransactionRecord {
        let (hash, signal, attempt) = {
            let mut state = self.state.lock();
            let Some(hash) = state.record.hash else {
                return state.record.clone();
            };
            if !state.record.transition(TxStatus::WaitingForReceipt) {
                return state.record.clone();
            }
            let (handle, signal) = cancel_pair();
            state.cancel = Some(handle);
            (hash, signal, state.attempt)
        };

        let guard = InFlightGuard {
            state: &self.state,
            attempt,
            armed: true,
        };
        let outcome = watcher.wait(hash, signal).await;
        guard.disarm();

        let mut state = self.state.lock();
        if state.attempt != attempt {
            return state.record.clone();
        }
        state.cancel = None;
        match outcome {
            WatchOutcome::Confirmed(receipt) => {
                state.record.block_number = receipt.block();
                state.record.transition(TxStatus::Confirmed);
            }
            WatchOutcome::Failed(message) => {
                state.record.fail(message);
            }
            WatchOutcome::TimedOut => {
                state.record.transition(TxStatus::TimedOut);
                state.record.error = Some("No receipt yet; the transaction may still be mined".into());
            }
            WatchOutcome::Cancelled => {}
        }
        state.record.clone()
    }

    /// Dismiss the status panel: stop watching and forget the record.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        if let Some(cancel) = state.cancel.take() {
            cancel.cancel();
        }
        state.attempt += 1;
        state.record = TransactionRecord::new();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use alloy_primitives::{Address, B256};
    use async_trait::async_trait;
    use serde_json::{Value, json};

    use super::*;
    use crate::contract::bills_of_exchange;
    use crate::mock::MockTransport;
    use crate::rpc::LedgerClient;
    use crate::watcher::ConfirmationPolicy;

    const RECIPIENT: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

    struct ScriptedSigner {
        reject_with: Option<String>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl ScriptedSigner {
        fn approving() -> Self {
            Self {
                reject_with: None,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        fn rejecting(message: &str) -> Self {
            Self {
                reject_with: Some(message.to_string()),
                ..Self::approving()
            }
        }
    }

    #[async_trait]
    impl TransactionSigner for ScriptedSigner {
        fn address(&self) -> Address {
            Address::repeat_byte(0x0a)
        }

        async fn send_transaction(&self, _tx: TransactionRequest) -> Result<B256, LedgerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match &self.reject_with {
                Some(message) => Err(LedgerError::Signer(message.clone())),
                None => Ok(B256::repeat_byte(0xbe)),
            }
        }
    }

    fn contract() -> Contract {
        bills_of_exchange(Address::repeat_byte(0x42)).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn approved_transfer_is_submitted() {
        let signer = Arc::new(ScriptedSigner::approving());
        let writer = WriteAdapter::new(signer.clone(), WriteOptions::default());

        let record = writer.transfer(&contract(), RECIPIENT, "1.5", 18).await.unwrap();
        assert_eq!(record.status, TxStatus::Submitted);
        assert_eq!(record.hash, Some(B256::repeat_byte(0xbe)));
        assert_eq!(signer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rejection_is_failed_with_wallet_message() {
        let signer = Arc::new(ScriptedSigner::rejecting("User rejected the request."));
        let writer = WriteAdapter::new(signer, WriteOptions::default());

        let record = writer.transfer(&contract(), RECIPIENT, "1", 18).await.unwrap();
        assert_eq!(record.status, TxStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("User rejected the request."));
        assert!(record.hash.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_input_never_reaches_signer() {
        let signer = Arc::new(ScriptedSigner::approving());
        let writer = WriteAdapter::new(signer.clone(), WriteOptions::default());

        assert!(writer.transfer(&contract(), "0x123", "1", 18).await.is_err());
        assert!(writer.transfer(&contract(), RECIPIENT, "0", 18).await.is_err());
        assert!(writer.transfer(&contract(), RECIPIENT, "abc", 18).await.is_err());
        assert_eq!(signer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(writer.status(), TxStatus::NotSubmitted);
    }

    #[tokio::test(start_paused = true)]
    async fn second_submit_while_pending_is_rejected() {
        let signer = Arc::new(ScriptedSigner {
            delay: Duration::from_secs(5),
            ..ScriptedSigner::approving()
        });
        let writer = WriteAdapter::new(signer.clone(), WriteOptions::default());
        let c = contract();

        let (first, second) = tokio::join!(writer.transfer(&c, RECIPIENT, "1", 18), async {
            tokio::task::yield_now().await;
            assert_eq!(writer.status(), TxStatus::PendingWalletConfirmation);
            writer.transfer(&c, RECIPIENT, "1", 18).await
        });

        assert!(first.is_ok());
        assert!(matches!(second, Err(LedgerError::SubmissionInFlight)));
        assert_eq!(signer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn second_submit_while_waiting_for_receipt_is_rejected() {
        let mock = Arc::new(MockTransport::new());
        mock.set_default("eth_getTransactionReceipt", Value::Null);
        let watcher = ConfirmationWatcher::new(LedgerClient::new(mock), ConfirmationPolicy::default());

        let signer = Arc::new(ScriptedSigner::approving());
        let writer = WriteAdapter::new(signer.clone(), WriteOptions::default());
        let c = contract();
        writer.transfer(&c, RECIPIENT, "1", 18).await.unwrap();

        let second = tokio::select! {
            _ = writer.await_confirmation(&watcher) => None,
            second = async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                assert_eq!(writer.status(), TxStatus::WaitingForReceipt);
                writer.transfer(&c, RECIPIENT, "1", 18).await
            } => Some(second),
        };

        assert!(matches!(second, Some(Err(LedgerError::SubmissionInFlight))));
        assert_eq!(signer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn read_only_method_is_not_sent() {
        let signer = Arc::new(ScriptedSigner::approving());
        let writer = WriteAdapter::new(signer.clone(), WriteOptions::default());
        let call = contract().call("totalSupply", Vec::new()).unwrap();

        let err = writer.submit(&call).await.unwrap_err();
        assert!(matches!(err, LedgerError::Abi(ref m) if m.contains("totalSupply()")), "{err}");
        assert_eq!(signer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(writer.status(), TxStatus::NotSubmitted);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_wallet_prompt_resets_record() {
        let signer = Arc::new(ScriptedSigner {
            delay: Duration::from_secs(60),
            ..ScriptedSigner::approving()
        });
        let writer = WriteAdapter::new(signer.clone(), WriteOptions::default());

        let pending = tokio::time::timeout(
            Duration::from_secs(5),
            writer.transfer(&contract(), RECIPIENT, "1", 18),
        )
        .await;
        assert!(pending.is_err());
        assert_eq!(writer.status(), TxStatus::NotSubmitted);

        tokio::time::advance(Duration::from_secs(2)).await;
        let record = tokio::time::timeout(
            Duration::from_secs(120),
            writer.transfer(&contract(), RECIPIENT, "1", 18),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(record.status, TxStatus::Submitted);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_confirmation_wait_resets_record() {
        let mock = Arc::new(MockTransport::new());
        mock.set_default("eth_getTransactionReceipt", Value::Null);
        let watcher = ConfirmationWatcher::new(LedgerClient::new(mock.clone()), ConfirmationPolicy::default());

        let writer = WriteAdapter::new(Arc::new(ScriptedSigner::approving()), WriteOptions::default());
        writer.transfer(&contract(), RECIPIENT, "2", 18).await.unwrap();

        let waited = tokio::time::timeout(Duration::from_secs(30), writer.await_confirmation(&watcher)).await;
        assert!(waited.is_err());
        assert_eq!(writer.status(), TxStatus::NotSubmitted);
        assert!(writer.record().hash.is_none());

        let polls = mock.count("eth_getTransactionReceipt");
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(mock.count("eth_getTransactionReceipt"), polls);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_resubmit_is_rate_limited() {
        let signer = Arc::new(ScriptedSigner::rejecting("nope"));
        let writer = WriteAdapter::new(signer.clone(), WriteOptions::default());

        writer.transfer(&contract(), RECIPIENT, "1", 18).await.unwrap();
        let err = writer.transfer(&contract(), RECIPIENT, "1", 18).await.unwrap_err();
        assert!(matches!(err, LedgerError::RateLimited { .. }));

        tokio::time::advance(Duration::from_secs(2)).await;
        writer.transfer(&contract(), RECIPIENT, "1", 18).await.unwrap();
        assert_eq!(signer.calls.load(Ordering::SeqCst), 2);
    }

    fn mined_receipt() -> Value {
        json!({
            "transactionHash": B256::repeat_byte(0xbe),
            "blockNumber": "0x20",
            "status": "0x1",
        })
    }

    #[tokio::test(start_paused = true)]
    async fn confirmation_moves_to_confirmed() {
        let mock = Arc::new(MockTransport::new());
        mock.push_ok("eth_getTransactionReceipt", Value::Null);
        mock.push_ok("eth_getTransactionReceipt", mined_receipt());
        let watcher = ConfirmationWatcher::new(LedgerClient::new(mock), ConfirmationPolicy::default());

        let writer = WriteAdapter::new(Arc::new(ScriptedSigner::approving()), WriteOptions::default());
        writer.transfer(&contract(), RECIPIENT, "2", 18).await.unwrap();

        let record = writer.await_confirmation(&watcher).await;
        assert_eq!(record.status, TxStatus::Confirmed);
        assert_eq!(record.block_number, Some(32));
        assert_eq!(record.hash, Some(B256::repeat_byte(0xbe)));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_reported() {
        let mock = Arc::new(MockTransport::new());
        mock.set_default("eth_getTransactionReceipt", Value::Null);
        let policy = ConfirmationPolicy {
            timeout: Some(Duration::from_secs(20)),
            ..ConfirmationPolicy::default()
        };
        let watcher = ConfirmationWatcher::new(LedgerClient::new(mock), policy);

        let writer = WriteAdapter::new(Arc::new(ScriptedSigner::approving()), WriteOptions::default());
        writer.transfer(&contract(), RECIPIENT, "2", 18).await.unwrap();

        let record = writer.await_confirmation(&watcher).await;
        assert_eq!(record.status, TxStatus::TimedOut);
        assert!(!record.is_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cancels_watch_and_resets() {
        let mock = Arc::new(MockTransport::new());
        mock.set_default("eth_getTransactionReceipt", Value::Null);
        let watcher = ConfirmationWatcher::new(LedgerClient::new(mock), ConfirmationPolicy::default());

        let writer = WriteAdapter::new(Arc::new(ScriptedSigner::approving()), WriteOptions::default());
        writer.transfer(&contract(), RECIPIENT, "2", 18).await.unwrap();

        let (record, ()) = tokio::join!(writer.await_confirmation(&watcher), async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            assert_eq!(writer.status(), TxStatus::WaitingForReceipt);
            writer.clear();
        });

        assert_eq!(record.status, TxStatus::NotSubmitted);
        assert_eq!(writer.status(), TxStatus::NotSubmitted);
        assert!(writer.record().hash.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn await_without_submission_is_noop() {
        let mock = Arc::new(MockTransport::new());
        let watcher = ConfirmationWatcher::new(LedgerClient::new(mock.clone()), ConfirmationPolicy::default());
        let writer = WriteAdapter::new(Arc::new(ScriptedSigner::approving()), WriteOptions::default());

        let record = writer.await_confirmation(&watcher).await;
        assert_eq!(record.status, TxStatus::NotSubmitted);
        assert_eq!(mock.call_count(), 0);
    }
}
