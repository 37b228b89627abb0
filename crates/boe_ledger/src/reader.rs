//! Read adapter: one read-only contract call, its last good value and its
//! loading state.

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, U256};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::contract::{Contract, ContractCall, FromDynValue, first_output};
use crate::error::LedgerError;
use crate::rpc::LedgerClient;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Fetch once on [`ReadAdapter::mount`]. Off by default: the first read
    /// happens when the user asks for it.
    pub enabled: bool,
}

struct ReadState<T> {
    call: ContractCall,
    value: Option<T>,
    last_error: Option<String>,
    working: bool,
    fetches: u64,
}

/// Clears `working` even if the fetch future is dropped mid-flight.
struct WorkingGuard<'a, T> {
    state: &'a Mutex<ReadState<T>>,
}

impl<T> Drop for WorkingGuard<'_, T> {
    fn drop(&mut self) {
        self.state.lock().working = false;
    }
}

/// Wraps one read-only method. Construction never touches the network.
///
/// State-changing methods are refused at construction: they need a
/// transaction, not an `eth_call`.
pub struct ReadAdapter<T> {
    client: LedgerClient,
    options: ReadOptions,
    state: Mutex<ReadState<T>>,
}

impl<T> ReadAdapter<T>
where
    T: FromDynValue + Clone + Send,
{
    pub fn new(client: LedgerClient, call: ContractCall, options: ReadOptions) -> Result<Self, LedgerError> {
        if !call.method.mutability().is_read_only() {
            return Err(LedgerError::Abi(format!(
                "{} changes state and cannot be read with eth_call",
                call.method.signature()
            )));
        }
        Ok(Self {
            client,
            options,
            state: Mutex::new(ReadState {
                call,
                value: None,
                last_error: None,
                working: false,
                fetches: 0,
            }),
        })
    }

    /// The initial fetch, performed only when [`ReadOptions::enabled`] is set.
    pub async fn mount(&self) -> Result<Option<T>, LedgerError> {
        if !self.options.enabled {
            return Ok(None);
        }
        self.refresh().await.map(Some)
    }

    /// Replace the call arguments and fetch.
    pub async fn fetch(&self, args: Vec<DynSolValue>) -> Result<T, LedgerError> {
        {
            let mut state = self.state.lock();
            if state.working {
                return Err(LedgerError::SubmissionInFlight);
            }
            state.call = state.call.with_args(args)?;
        }
        self.refresh().await
    }

    /// Fetch with the current arguments.
    ///
    /// On failure the previous value stays visible and the error is kept in
    /// [`Self::last_error`].
    pub async fn refresh(&self) -> Result<T, LedgerError> {
        let call = {
            let mut state = self.state.lock();
            if state.working {
                return Err(LedgerError::SubmissionInFlight);
            }
            state.working = true;
            state.fetches += 1;
            state.call.clone()
        };
        let _guard = WorkingGuard { state: &self.state };

        debug!(method = call.method.name(), contract = %call.to, "contract read");
        let result = match call.read(&self.client).await {
            Ok(values) => first_output::<T>(&values),
            Err(e) => Err(e),
        };

        let mut state = self.state.lock();
        match result {
            Ok(value) => {
                state.value = Some(value.clone());
                state.last_error = None;
                Ok(value)
            }
            Err(e) => {
                warn!(method = call.method.name(), error = %e, "contract read failed");
                state.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Last successfully read value.
    pub fn value(&self) -> Option<T> {
        self.state.lock().value.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.lock().last_error.clone()
    }

    pub fn is_working(&self) -> bool {
        self.state.lock().working
    }

    /// How many network reads have been started.
    pub fn fetch_count(&self) -> u64 {
        self.state.lock().fetches
    }

    pub fn options(&self) -> ReadOptions {
        self.options
    }
}

/// `balanceOf(owner)`.
pub fn balance_of(
    client: LedgerClient,
    contract: &Contract,
    owner: Address,
    options: ReadOptions,
) -> Result<ReadAdapter<U256>, LedgerError> {
    let call = contract.call("balanceOf", vec![DynSolValue::Address(owner)])?;
    ReadAdapter::new(client, call, options)
}

/// `totalSupply()`.
pub fn total_supply(
    client: LedgerClient,
    contract: &Contract,
    options: ReadOptions,
) -> Result<ReadAdapter<U256>, LedgerError> {
    let call = contract.call("totalSupply", Vec::new())?;
    ReadAdapter::new(client, call, options)
}

/// `description()`.
pub fn description(
    client: LedgerClient,
    contract: &Contract,
    options: ReadOptions,
) -> Result<ReadAdapter<String>, LedgerError> {
    let call = contract.call("description", Vec::new())?;
    ReadAdapter::new(client, call, options)
}
