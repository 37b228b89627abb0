//! Lifecycle record of a single state-changing submission.

use alloy_primitives::B256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Where a submission is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TxStatus {
    #[default]
    NotSubmitted,
    PendingWalletConfirmation,
    Submitted,
    WaitingForReceipt,
    Confirmed,
    Failed,
    /// No receipt before the watcher's deadline. The transaction may still
    /// be mined later.
    TimedOut,
}

impl TxStatus {
    /// A new submission must be refused while this is `true`.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            TxStatus::PendingWalletConfirmation | TxStatus::Submitted | TxStatus::WaitingForReceipt
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TxStatus::Confirmed | TxStatus::Failed | TxStatus::TimedOut)
    }

    pub fn label(&self) -> &'static str {
        match self {
            TxStatus::NotSubmitted => "Not submitted",
            TxStatus::PendingWalletConfirmation => "Waiting for wallet confirmation",
            TxStatus::Submitted => "Submitted",
            TxStatus::WaitingForReceipt => "Waiting for receipt",
            TxStatus::Confirmed => "Confirmed",
            TxStatus::Failed => "Failed",
            TxStatus::TimedOut => "Timed out",
        }
    }

    pub fn can_transition_to(&self, next: TxStatus) -> bool {
        use TxStatus::*;
        matches!(
            (self, next),
            (NotSubmitted, PendingWalletConfirmation)
                | (PendingWalletConfirmation, Submitted)
                | (PendingWalletConfirmation, Failed)
                | (Submitted, WaitingForReceipt)
                | (WaitingForReceipt, Confirmed)
                | (WaitingForReceipt, Failed)
                | (WaitingForReceipt, TimedOut)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub hash: Option<B256>,
    pub status: TxStatus,
    pub error: Option<String>,
    pub block_number: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl Default for TransactionRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionRecord {
    pub fn new() -> Self {
        Self {
            hash: None,
            status: TxStatus::NotSubmitted,
            error: None,
            block_number: None,
            created_at: Utc::now(),
        }
    }

    /// Move to `next` if the transition is legal. Returns whether it moved.
    pub fn transition(&mut self, next: TxStatus) -> bool {
        if !self.status.can_transition_to(next) {
            debug!(from = ?self.status, to = ?next, "ignoring illegal status transition");
            return false;
        }
        self.status = next;
        true
    }

    /// Move to `Failed` with `message` shown to the user as-is.
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        let moved = self.transition(TxStatus::Failed);
        if moved {
            self.error = Some(message.into());
        }
        moved
    }

    pub fn is_in_flight(&self) -> bool {
        self.status.is_in_flight()
    }
}
