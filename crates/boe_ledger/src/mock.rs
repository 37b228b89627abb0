//! In-memory [`Transport`] with scripted responses, for tests.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::LedgerError;
use crate::rpc::Transport;

/// One request seen by a [`MockTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: String,
    pub params: Value,
}

/// Scripted JSON-RPC endpoint.
///
/// Each method has a FIFO queue of one-shot responses and an optional sticky
/// default used once the queue is empty. Unscripted methods fail with
/// [`LedgerError::Transport`].
#[derive(Default)]
pub struct MockTransport {
    queued: Mutex<HashMap<String, VecDeque<Result<Value, LedgerError>>>>,
    defaults: Mutex<HashMap<String, Value>>,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` (tokio time) before answering every request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_ok(&self, method: &str, result: Value) {
        self.queued
            .lock()
            .entry(method.to_string())
            .or_default()
            .push_back(Ok(result));
    }

    pub fn push_err(&self, method: &str, err: LedgerError) {
        self.queued
            .lock()
            .entry(method.to_string())
            .or_default()
            .push_back(Err(err));
    }

    /// Answer `method` with `result` whenever nothing is queued for it.
    pub fn set_default(&self, method: &str, result: Value) {
        self.defaults.lock().insert(method.to_string(), result);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Number of requests made for `method`.
    pub fn count(&self, method: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.method == method).count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        self.calls.lock().push(RecordedCall {
            method: method.to_string(),
            params,
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self
            .queued
            .lock()
            .get_mut(method)
            .and_then(|queue| queue.pop_front());
        if let Some(response) = queued {
            return response;
        }

        self.defaults
            .lock()
            .get(method)
            .cloned()
            .ok_or_else(|| LedgerError::Transport(format!("no mock response for {method}")))
    }
}
