//! Headless widget models: the balance lookup and the transfer form.
//!
//! A view layer renders these; everything it needs to show (messages, button
//! labels, the formatted balance) is computed here.

use std::sync::Arc;

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, U256};

use crate::chain::Explorer;
use crate::context::LedgerContext;
use crate::error::LedgerError;
use crate::reader::{ReadAdapter, ReadOptions, balance_of};
use crate::signer::TransactionSigner;
use crate::transaction::{TransactionRecord, TxStatus};
use crate::units::to_human;
use crate::validation::{AddressValidation, AmountValidation, validate_address, validate_amount};
use crate::writer::WriteAdapter;

pub const NO_DATA: &str = "no data";

pub const LABEL_TRANSFER: &str = "Transfer";
pub const LABEL_CONFIRM_IN_WALLET: &str = "Confirm in wallet...";
pub const LABEL_CONFIRMING: &str = "Confirming Transaction...";

// ---------------------------------------------------------------------------
// BalanceWidget
// ---------------------------------------------------------------------------

pub struct BalanceWidget {
    decimals: u8,
    validation: AddressValidation,
    last_checked: Option<Address>,
    reader: ReadAdapter<U256>,
}

impl BalanceWidget {
    /// The reader starts disabled: nothing is fetched until an address has
    /// been entered and [`Self::refresh`] is called.
    pub fn new(ctx: &LedgerContext) -> Result<Self, LedgerError> {
        let reader = balance_of(
            ctx.client.clone(),
            &ctx.contract,
            Address::ZERO,
            ReadOptions { enabled: false },
        )?;
        Ok(Self {
            decimals: ctx.decimals,
            validation: validate_address(""),
            last_checked: None,
            reader,
        })
    }

    pub fn set_input(&mut self, input: &str) -> &AddressValidation {
        self.validation = validate_address(input);
        &self.validation
    }

    pub fn validation(&self) -> &AddressValidation {
        &self.validation
    }

    pub fn can_refresh(&self) -> bool {
        self.validation.is_valid() && !self.reader.is_working()
    }

    pub fn is_loading(&self) -> bool {
        self.reader.is_working()
    }

    /// Read the balance of the entered address and return it formatted.
    pub async fn refresh(&mut self) -> Result<String, LedgerError> {
        let Some(owner) = self.validation.address else {
            return Err(LedgerError::InvalidInput(self.validation.message.clone()));
        };
        self.last_checked = Some(owner);
        let units = self.reader.fetch(vec![DynSolValue::Address(owner)]).await?;
        Ok(to_human(units, self.decimals))
    }

    /// The last successfully read balance, or [`NO_DATA`].
    pub fn display(&self) -> String {
        self.reader
            .value()
            .map(|units| to_human(units, self.decimals))
            .unwrap_or_else(|| NO_DATA.to_string())
    }

    pub fn last_checked(&self) -> Option<Address> {
        self.last_checked
    }

    pub fn last_error(&self) -> Option<String> {
        self.reader.last_error()
    }
}

// ---------------------------------------------------------------------------
// TransferWidget
// ---------------------------------------------------------------------------

pub struct TransferWidget {
    ctx: LedgerContext,
    address_input: String,
    amount_input: String,
    address: AddressValidation,
    amount: AmountValidation,
    writer: WriteAdapter,
}

impl TransferWidget {
    pub fn new(ctx: LedgerContext, signer: Arc<dyn TransactionSigner>) -> Self {
        let writer = WriteAdapter::new(signer, ctx.write_options);
        let amount = validate_amount("", ctx.decimals);
        Self {
            ctx,
            address_input: String::new(),
            amount_input: String::new(),
            address: validate_address(""),
            amount,
            writer,
        }
    }

    pub fn set_address(&mut self, input: &str) -> &AddressValidation {
        self.address_input = input.to_string();
        self.address = validate_address(input);
        &self.address
    }

    pub fn set_amount(&mut self, input: &str) -> &AmountValidation {
        self.amount_input = input.to_string();
        self.amount = validate_amount(input, self.ctx.decimals);
        &self.amount
    }

    pub fn address_validation(&self) -> &AddressValidation {
        &self.address
    }

    pub fn amount_validation(&self) -> &AmountValidation {
        &self.amount
    }

    pub fn can_submit(&self) -> bool {
        self.address.is_valid() && self.amount.is_valid() && !self.writer.is_busy()
    }

    pub fn button_label(&self) -> &'static str {
        match self.writer.status() {
            TxStatus::PendingWalletConfirmation => LABEL_CONFIRM_IN_WALLET,
            TxStatus::Submitted | TxStatus::WaitingForReceipt => LABEL_CONFIRMING,
            _ => LABEL_TRANSFER,
        }
    }

    pub async fn submit(&self) -> Result<TransactionRecord, LedgerError> {
        self.writer
            .transfer(
                &self.ctx.contract,
                &self.address_input,
                &self.amount_input,
                self.ctx.decimals,
            )
            .await
    }

    pub async fn confirm(&self) -> TransactionRecord {
        self.writer.await_confirmation(&self.ctx.watcher()).await
    }

    /// Submit, then follow the transaction if the wallet approved it.
    ///
    /// Dropping the future (the view went away) stops polling and puts the
    /// button back to "Transfer".
    pub async fn submit_and_confirm(&self) -> Result<TransactionRecord, LedgerError> {
        let record = self.submit().await?;
        if record.status != TxStatus::Submitted {
            return Ok(record);
        }
        Ok(self.confirm().await)
    }

    pub fn record(&self) -> TransactionRecord {
        self.writer.record()
    }

    pub fn clear_status(&self) {
        self.writer.clear();
    }

    pub fn explorer_tx_link(&self, explorer: Explorer) -> Option<String> {
        self.writer
            .record()
            .hash
            .map(|hash| explorer.tx_url(self.ctx.chain, &hash))
    }
}
