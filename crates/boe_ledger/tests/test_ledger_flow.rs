use std::sync::Arc;
use std::time::Duration;

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, B256, Bytes, U256};
use boe_ledger::mock::MockTransport;
use boe_ledger::watcher::CancelSignal;
use boe_ledger::*;
use serde_json::{Value, json};

const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const RECIPIENT: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

fn sepolia_context(mock: &Arc<MockTransport>) -> LedgerContext {
    let address = deployed_address(Chain::Sepolia).unwrap();
    LedgerContext::new(
        Chain::Sepolia,
        LedgerClient::new(mock.clone()),
        bills_of_exchange(address).unwrap(),
    )
}

fn uint_result(n: u128) -> Value {
    json!(Bytes::from(
        DynSolValue::Tuple(vec![DynSolValue::Uint(U256::from(n), 256)]).abi_encode_params()
    ))
}

fn script_local_signing(mock: &MockTransport, hash: B256) {
    mock.push_ok("eth_getTransactionCount", json!("0x0"));
    mock.push_ok("eth_estimateGas", json!("0xc350"));
    mock.push_ok("eth_maxPriorityFeePerGas", json!("0x3b9aca00"));
    mock.push_ok("eth_getBlockByNumber", json!({ "baseFeePerGas": "0x3b9aca00" }));
    mock.push_ok("eth_sendRawTransaction", json!(hash));
}

// ---------------------------------------------------------------------------
// Transfer with a local key, three confirmations
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn local_key_transfer_reaches_confirmed() {
    let mock = Arc::new(MockTransport::new());
    let hash = B256::repeat_byte(0x5e);
    script_local_signing(&mock, hash);
    mock.push_ok("eth_getTransactionReceipt", Value::Null);
    mock.set_default(
        "eth_getTransactionReceipt",
        json!({ "transactionHash": hash, "blockNumber": "0x100", "status": "0x1" }),
    );
    mock.push_ok("eth_blockNumber", json!("0x100"));
    mock.set_default("eth_blockNumber", json!("0x102"));

    let mut ctx = sepolia_context(&mock);
    ctx.policy = ConfirmationPolicy::deployment();

    let signer = Arc::new(
        LocalKeySigner::from_hex(DEV_KEY, ctx.client.clone(), Chain::Sepolia.chain_id()).unwrap(),
    );
    let mut widget = TransferWidget::new(ctx, signer);
    widget.set_address(RECIPIENT);
    widget.set_amount("0.25");

    let record = widget.submit_and_confirm().await.unwrap();
    assert_eq!(record.status, TxStatus::Confirmed);
    assert_eq!(record.hash, Some(hash));
    assert_eq!(record.block_number, Some(0x100));
    assert_eq!(mock.count("eth_sendRawTransaction"), 1);
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn balance_widget_reads_through_context() {
    let mock = Arc::new(MockTransport::new());
    mock.push_ok("eth_call", uint_result(42_000_000_000_000_000_000));

    let ctx = sepolia_context(&mock);
    let mut widget = BalanceWidget::new(&ctx).unwrap();
    widget.set_input(RECIPIENT);

    assert_eq!(widget.refresh().await.unwrap(), "42");
    let call = &mock.calls()[0];
    assert_eq!(call.method, "eth_call");
    assert_eq!(call.params[0]["to"], json!(ctx.contract.address()));
    assert_eq!(call.params[1], "latest");
}

#[tokio::test]
async fn generic_call_reads_any_method() {
    let mock = Arc::new(MockTransport::new());
    let owner = Address::repeat_byte(0x0e);
    mock.push_ok(
        "eth_call",
        json!(Bytes::from(
            DynSolValue::Tuple(vec![DynSolValue::Address(owner)]).abi_encode_params()
        )),
    );

    let ctx = sepolia_context(&mock);
    let values = ctx
        .contract
        .call("owner", vec![])
        .unwrap()
        .read(&ctx.client)
        .await
        .unwrap();
    assert_eq!(Address::from_dyn(&values[0]).unwrap(), owner);
}

// ---------------------------------------------------------------------------
// Background watch
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn background_watch_and_direct_wait_agree() {
    let mock = Arc::new(MockTransport::new());
    let hash = B256::repeat_byte(0x77);
    mock.push_ok("eth_getTransactionReceipt", Value::Null);
    mock.set_default(
        "eth_getTransactionReceipt",
        json!({ "transactionHash": hash, "blockNumber": "0x9", "status": "0x1" }),
    );

    let watcher = sepolia_context(&mock).watcher();
    let handle = watcher.watch(hash);
    assert_eq!(handle.hash(), hash);
    let background = handle.outcome().await;

    let direct = watcher.wait(hash, CancelSignal::never()).await;
    assert_eq!(background, direct);
    assert!(matches!(direct, WatchOutcome::Confirmed(_)));
}

#[tokio::test(start_paused = true)]
async fn unresponsive_endpoint_times_out() {
    let mock = Arc::new(MockTransport::new().with_delay(Duration::from_secs(1)));
    mock.set_default("eth_getTransactionReceipt", Value::Null);

    let mut ctx = sepolia_context(&mock);
    ctx.policy.timeout = Some(Duration::from_secs(30));

    let outcome = ctx.watcher().wait(B256::repeat_byte(1), CancelSignal::never()).await;
    assert_eq!(outcome, WatchOutcome::TimedOut);
}
