//! Source verification against Etherscan-compatible explorer APIs.

use std::time::Duration;

use alloy_primitives::{Address, Bytes};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use boe_ledger::{Chain, Explorer};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

/// Everything an explorer needs to rebuild the deployed bytecode.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub chain: Chain,
    pub address: Address,
    /// `contracts/Foo.sol:Foo`
    pub contract_name: String,
    /// `v0.8.28+commit.7893614a`
    pub compiler_version: String,
    pub standard_json_input: String,
    pub constructor_args: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    Verified,
    AlreadyVerified,
}

#[async_trait]
pub trait Verifier: Send + Sync {
    fn name(&self) -> &str;

    async fn verify(&self, request: &VerificationRequest) -> Result<VerificationStatus>;
}

// ---------------------------------------------------------------------------
// Response classification
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: Value,
}

impl ExplorerResponse {
    fn result_text(&self) -> String {
        match &self.result {
            Value::String(s) => s.clone(),
            Value::Null => self.message.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SubmitReply {
    Guid(String),
    AlreadyVerified,
}

#[derive(Debug, PartialEq, Eq)]
enum CheckReply {
    Pending,
    Done(VerificationStatus),
}

fn is_already_verified(text: &str) -> bool {
    text.to_ascii_lowercase().contains("already verified")
}

fn classify_submit(response: &ExplorerResponse) -> Result<SubmitReply> {
    let text = response.result_text();
    if is_already_verified(&text) {
        return Ok(SubmitReply::AlreadyVerified);
    }
    if response.status == "1" {
        return Ok(SubmitReply::Guid(text));
    }
    bail!("verification rejected: {text}")
}

fn classify_check(response: &ExplorerResponse) -> Result<CheckReply> {
    let text = response.result_text();
    let lower = text.to_ascii_lowercase();
    if is_already_verified(&text) {
        return Ok(CheckReply::Done(VerificationStatus::AlreadyVerified));
    }
    if lower.contains("pending") || lower.contains("in progress") {
        return Ok(CheckReply::Pending);
    }
    if response.status == "1" || lower.starts_with("pass") {
        return Ok(CheckReply::Done(VerificationStatus::Verified));
    }
    bail!("verification failed: {text}")
}

// ---------------------------------------------------------------------------
// ExplorerVerifier
// ---------------------------------------------------------------------------

/// `verifysourcecode` + `checkverifystatus` client. Etherscan's v2 API takes
/// an API key and the chain id; Blockscout's compatible endpoint takes neither.
pub struct ExplorerVerifier {
    explorer: Explorer,
    api_url: String,
    api_key: Option<String>,
    client: Client,
    poll_interval: Duration,
    max_polls: u32,
}

impl ExplorerVerifier {
    pub fn etherscan(chain: Chain, api_key: Option<String>) -> Result<Self> {
        Self::new(Explorer::Etherscan, Explorer::Etherscan.api_url(chain), api_key)
    }

    pub fn blockscout(chain: Chain) -> Result<Self> {
        Self::new(Explorer::Blockscout, Explorer::Blockscout.api_url(chain), None)
    }

    pub fn new(explorer: Explorer, api_url: String, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            explorer,
            api_url,
            api_key,
            client,
            poll_interval: Duration::from_secs(5),
            max_polls: 24,
        })
    }

    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls.max(1);
        self
    }

    fn query(&self, chain: Chain) -> Vec<(&'static str, String)> {
        match self.explorer {
            Explorer::Etherscan => vec![("chainid", chain.chain_id().to_string())],
            Explorer::Blockscout => Vec::new(),
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<ExplorerResponse> {
        let response = request.send().await.context("explorer request failed")?;
        let status = response.status();
        let text = response.text().await.context("failed to read explorer response")?;
        if !status.is_success() {
            bail!("{} API returned HTTP {status}: {text}", self.explorer);
        }
        serde_json::from_str(&text)
            .with_context(|| format!("unexpected {} API response: {text}", self.explorer))
    }

    async fn submit(&self, request: &VerificationRequest, api_key: &str) -> Result<SubmitReply> {
        let constructor_args = alloy_primitives::hex::encode(&request.constructor_args);
        let mut form = vec![
            ("module", "contract".to_string()),
            ("action", "verifysourcecode".to_string()),
            ("contractaddress", request.address.to_string()),
            ("sourceCode", request.standard_json_input.clone()),
            ("codeformat", "solidity-standard-json-input".to_string()),
            ("contractname", request.contract_name.clone()),
            ("compilerversion", request.compiler_version.clone()),
            // Misspelling is the API's own.
            ("constructorArguements", constructor_args),
        ];
        if !api_key.is_empty() {
            form.push(("apikey", api_key.to_string()));
        }

        let builder = self
            .client
            .post(&self.api_url)
            .query(&self.query(request.chain))
            .form(&form);
        classify_submit(&self.send(builder).await?)
    }

    async fn check(&self, chain: Chain, guid: &str, api_key: &str) -> Result<CheckReply> {
        let mut query = self.query(chain);
        query.push(("module", "contract".to_string()));
        query.push(("action", "checkverifystatus".to_string()));
        query.push(("guid", guid.to_string()));
        if !api_key.is_empty() {
            query.push(("apikey", api_key.to_string()));
        }

        let builder = self.client.get(&self.api_url).query(&query);
        classify_check(&self.send(builder).await?)
    }
}

#[async_trait]
impl Verifier for ExplorerVerifier {
    fn name(&self) -> &str {
        self.explorer.label()
    }

    async fn verify(&self, request: &VerificationRequest) -> Result<VerificationStatus> {
        let api_key = match (self.explorer, &self.api_key) {
            (Explorer::Etherscan, None) => bail!("ETHERSCAN_API_KEY is not set"),
            (_, key) => key.clone().unwrap_or_default(),
        };

        info!(explorer = %self.explorer, address = %request.address, "submitting source for verification");
        let guid = match self.submit(request, &api_key).await? {
            SubmitReply::AlreadyVerified => return Ok(VerificationStatus::AlreadyVerified),
            SubmitReply::Guid(guid) => guid,
        };

        for attempt in 1..=self.max_polls {
            tokio::time::sleep(self.poll_interval).await;
            match self.check(request.chain, &guid, &api_key).await? {
                CheckReply::Pending => debug!(explorer = %self.explorer, attempt, "verification pending"),
                CheckReply::Done(status) => return Ok(status),
            }
        }
        bail!(
            "{} did not finish verifying after {} checks",
            self.explorer,
            self.max_polls
        )
    }
}
