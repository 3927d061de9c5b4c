//! Verified source lookup against the Etherscan `getsourcecode` endpoint.

use alloy_primitives::Address;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://api.etherscan.io/v2/api";
pub const DEFAULT_CHAIN_ID: u64 = 1;

/// Source of published contract code.
#[async_trait]
pub trait SourceLookup: Send + Sync {
    /// `Ok(None)` when the service has no entry for `address`.
    async fn source_code(&self, address: Address) -> Result<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct SourceCodeResponse {
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: Value,
}

#[derive(Debug, Deserialize)]
struct SourceCodeEntry {
    #[serde(rename = "SourceCode", default)]
    source_code: String,
}

#[derive(Debug, Clone)]
pub struct EtherscanClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    chain_id: u64,
}

impl EtherscanClient {
    /// `chain_id` selects the network on the multichain (v2) API.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, chain_id: u64) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            chain_id,
        }
    }
}

#[async_trait]
impl SourceLookup for EtherscanClient {
    async fn source_code(&self, address: Address) -> Result<Option<String>> {
        let address = format!("{address:?}");
        let chain_id = self.chain_id.to_string();
        debug!("Requesting source code for {}", address);

        let response: SourceCodeResponse = self
            .http
            .get(&self.base_url)
            .query(&[
                ("chainid", chain_id.as_str()),
                ("module", "contract"),
                ("action", "getsourcecode"),
                ("address", address.as_str()),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .context("Source code request failed")?
            .error_for_status()
            .context("Source code request rejected")?
            .json()
            .await
            .context("Malformed source code response")?;

        match response.result {
            Value::Array(entries) => {
                let Some(first) = entries.into_iter().next() else {
                    return Ok(None);
                };
                let entry: SourceCodeEntry =
                    serde_json::from_value(first).context("Malformed source code entry")?;
                Ok(Some(entry.source_code))
            }
            Value::Null => Ok(None),
            // Errors such as a bad key or a rate limit come back as a plain string
            Value::String(reason) => {
                anyhow::bail!("Etherscan error: {} ({})", reason, response.message)
            }
            other => anyhow::bail!("Unexpected source code result: {}", other),
        }
    }
}
