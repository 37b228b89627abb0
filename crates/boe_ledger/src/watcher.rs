//! Polls for a transaction receipt until it has enough confirmations.

use std::time::Duration;

use alloy_primitives::B256;
use boe_core::BoeConfig;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::LedgerError;
use crate::rpc::{LedgerClient, TransactionReceipt};

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    /// Blocks including the receipt's own block. `0` is treated as `1`.
    pub confirmations: u64,
    pub poll_interval: Duration,
    /// `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            confirmations: 1,
            poll_interval: Duration::from_secs(4),
            timeout: Some(Duration::from_secs(600)),
        }
    }
}

impl ConfirmationPolicy {
    /// Contract deployments wait for three blocks.
    pub fn deployment() -> Self {
        Self {
            confirmations: 3,
            ..Self::default()
        }
    }

    pub fn from_config(config: &BoeConfig) -> Self {
        Self {
            confirmations: config.confirmations,
            poll_interval: config.poll_interval(),
            timeout: config.receipt_timeout(),
        }
    }

    fn required(&self) -> u64 {
        self.confirmations.max(1)
    }
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Sending half of a cancellation signal.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.0.send(true);
    }
}

/// Receiving half of a cancellation signal. A dropped [`CancelHandle`] is not
/// a cancellation: the signal simply never fires.
#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    /// A signal nothing can fire.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self(rx)
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once [`CancelHandle::cancel`] has been called.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelSignal(rx))
}

// ---------------------------------------------------------------------------
// Watcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    Confirmed(TransactionReceipt),
    /// Reverted on chain, a non-transient poll error, or the watch task died.
    Failed(String),
    TimedOut,
    Cancelled,
}

#[derive(Clone)]
pub struct ConfirmationWatcher {
    client: LedgerClient,
    policy: ConfirmationPolicy,
}

impl ConfirmationWatcher {
    pub fn new(client: LedgerClient, policy: ConfirmationPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> &ConfirmationPolicy {
        &self.policy
    }

    /// Poll until `hash` is confirmed, reverted, past the deadline, or
    /// `cancel` fires. Transient failures while polling are logged and the
    /// poll is retried on the next tick; any other error ends the watch as
    /// [`WatchOutcome::Failed`].
    pub async fn wait(&self, hash: B256, mut cancel: CancelSignal) -> WatchOutcome {
        let started = Instant::now();
        let required = self.policy.required();
        info!(tx_hash = %hash, confirmations = required, "waiting for transaction receipt");

        loop {
            if cancel.is_cancelled() {
                debug!(tx_hash = %hash, "confirmation watch cancelled");
                return WatchOutcome::Cancelled;
            }

            match self.poll_once(hash, required).await {
                Ok(Some(outcome)) => return outcome,
                Ok(None) => {}
                Err(e) if e.is_transient() => {
                    warn!(tx_hash = %hash, error = %e, "receipt poll failed, will retry")
                }
                Err(e) => {
                    warn!(tx_hash = %hash, error = %e, "receipt poll failed");
                    return WatchOutcome::Failed(e.to_string());
                }
            }

            if let Some(timeout) = self.policy.timeout {
                if started.elapsed() >= timeout {
                    warn!(tx_hash = %hash, ?timeout, "no confirmed receipt before deadline");
                    return WatchOutcome::TimedOut;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.policy.poll_interval) => {}
                _ = cancel.cancelled() => {
                    debug!(tx_hash = %hash, "confirmation watch cancelled");
                    return WatchOutcome::Cancelled;
                }
            }
        }
    }

    async fn poll_once(&self, hash: B256, required: u64) -> Result<Option<WatchOutcome>, LedgerError> {
        let Some(receipt) = self.client.transaction_receipt(hash).await? else {
            return Ok(None);
        };

        if !receipt.succeeded() {
            warn!(tx_hash = %hash, "transaction reverted");
            return Ok(Some(WatchOutcome::Failed(format!("transaction {hash} reverted"))));
        }

        let Some(mined_in) = receipt.block() else {
            return Ok(None);
        };

        if required > 1 {
            let head = self.client.block_number().await?;
            let depth = head.saturating_sub(mined_in) + 1;
            if depth < required {
                debug!(tx_hash = %hash, depth, required, "waiting for more confirmations");
                return Ok(None);
            }
        }

        info!(tx_hash = %hash, block = mined_in, "transaction confirmed");
        Ok(Some(WatchOutcome::Confirmed(receipt)))
    }

    /// Run [`Self::wait`] on a background task.
    pub fn watch(&self, hash: B256) -> WatchHandle {
        let (cancel, signal) = cancel_pair();
        let watcher = self.clone();
        let task = tokio::spawn(async move { watcher.wait(hash, signal).await });
        WatchHandle {
            hash,
            cancel,
            task: Some(task),
        }
    }
}

/// Owner of a background watch. Dropping it aborts the watch.
pub struct WatchHandle {
    hash: B256,
    cancel: CancelHandle,
    task: Option<JoinHandle<WatchOutcome>>,
}

impl WatchHandle {
    pub fn hash(&self) -> B256 {
        self.hash
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|t| t.is_finished())
    }

    pub async fn outcome(mut self) -> WatchOutcome {
        let Some(task) = self.task.take() else {
            return WatchOutcome::Cancelled;
        };
        match task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => WatchOutcome::Cancelled,
            Err(e) => WatchOutcome::Failed(format!("watch task failed: {e}")),
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
