//! Read model of a bill's descriptive fields.

use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::contract::{Contract, FromDynValue, first_output};
use crate::error::LedgerError;
use crate::rpc::LedgerClient;
use crate::units::to_human;

/// Everything the bill's detail page shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillDetails {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: U256,
    pub description: String,
    pub drawer: String,
    pub drawer_address: Address,
    pub drawee: String,
    pub drawee_address: Address,
    pub currency: String,
    pub sum_to_be_paid_for_every_token: U256,
    pub time_of_payment: String,
    pub place_where_the_bill_is_issued: String,
    pub place_where_payment_is_to_be_made: String,
    pub issued_on_unix_time: u64,
    /// Zero until the drawee accepts the bill.
    pub accepted_on_unix_time: u64,
}

impl BillDetails {
    pub fn is_accepted(&self) -> bool {
        self.accepted_on_unix_time != 0
    }

    pub fn issued_on(&self) -> Option<DateTime<Utc>> {
        unix_to_datetime(self.issued_on_unix_time)
    }

    pub fn accepted_on(&self) -> Option<DateTime<Utc>> {
        unix_to_datetime(self.accepted_on_unix_time)
    }

    pub fn total_supply_human(&self) -> String {
        to_human(self.total_supply, self.decimals)
    }
}

fn unix_to_datetime(secs: u64) -> Option<DateTime<Utc>> {
    if secs == 0 {
        return None;
    }
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::from_timestamp(s, 0))
}

async fn read_field<T: FromDynValue>(
    client: &LedgerClient,
    contract: &Contract,
    method: &str,
) -> Result<T, LedgerError> {
    let values = contract.call(method, Vec::new())?.read(client).await?;
    first_output(&values)
}

/// Read every descriptive field of the bill, one `eth_call` each.
pub async fn fetch_bill_details(
    client: &LedgerClient,
    contract: &Contract,
) -> Result<BillDetails, LedgerError> {
    debug!(contract = %contract.address(), "fetching bill details");

    Ok(BillDetails {
        name: read_field(client, contract, "name").await?,
        symbol: read_field(client, contract, "symbol").await?,
        decimals: read_field(client, contract, "decimals").await?,
        total_supply: read_field(client, contract, "totalSupply").await?,
        description: read_field(client, contract, "description").await?,
        drawer: read_field(client, contract, "drawer").await?,
        drawer_address: read_field(client, contract, "drawerEthereumAddress").await?,
        drawee: read_field(client, contract, "drawee").await?,
        drawee_address: read_field(client, contract, "draweeEthereumAddress").await?,
        currency: read_field(client, contract, "currency").await?,
        sum_to_be_paid_for_every_token: read_field(client, contract, "sumToBePaidForEveryToken")
            .await?,
        time_of_payment: read_field(client, contract, "timeOfPayment").await?,
        place_where_the_bill_is_issued: read_field(client, contract, "placeWhereTheBillIsIssued")
            .await?,
        place_where_payment_is_to_be_made: read_field(
            client,
            contract,
            "placeWherePaymentIsToBeMade",
        )
        .await?,
        issued_on_unix_time: read_field(client, contract, "issuedOnUnixTime").await?,
        accepted_on_unix_time: read_field(client, contract, "acceptedOnUnixTime").await?,
    })
}
