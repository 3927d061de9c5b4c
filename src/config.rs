use crate::etherscan::{DEFAULT_API_URL, DEFAULT_CHAIN_ID};
use anyhow::{Context, Result};
use reqwest::Url;
use std::time::Duration;

const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;
const DEFAULT_HEARTBEAT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RECONNECT_DELAY_SECS: u64 = 5;
const DEFAULT_VERIFICATION_GRACE_SECS: u64 = 120; // time for explorers to index the new source

#[derive(Debug, Clone)]
pub struct Config {
    pub ws_url: String,
    pub etherscan_api_key: String,
    pub etherscan_api_url: String,
    pub etherscan_chain_id: u64,
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
    pub reconnect_delay: Duration,
    pub verification_grace: Duration,
    pub max_in_flight: Option<usize>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let ws_url = lookup("WSS_URL")
            .or_else(|| lookup("INFURA_WSS_URL"))
            .context("WSS_URL must be set in .env")?;
        validate_ws_url(&ws_url)?;

        let etherscan_api_key = lookup("ETHERSCAN_API_KEY")
            .or_else(|| lookup("API_KEY"))
            .filter(|key| !key.trim().is_empty())
            .context("ETHERSCAN_API_KEY must be set in .env")?;

        let etherscan_api_url =
            lookup("ETHERSCAN_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let etherscan_chain_id = match lookup("ETHERSCAN_CHAIN_ID") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .with_context(|| format!("Invalid ETHERSCAN_CHAIN_ID: {value}"))?,
            None => DEFAULT_CHAIN_ID,
        };

        let secs = |key: &str, default: u64| -> Result<Duration> {
            match lookup(key) {
                Some(value) => value
                    .trim()
                    .parse()
                    .map(Duration::from_secs)
                    .with_context(|| format!("Invalid {key}: {value}")),
                None => Ok(Duration::from_secs(default)),
            }
        };

        let max_in_flight = lookup("MAX_IN_FLIGHT")
            .map(|value| {
                value
                    .trim()
                    .parse::<usize>()
                    .with_context(|| format!("Invalid MAX_IN_FLIGHT: {value}"))
            })
            .transpose()?;

        let config = Config {
            ws_url,
            etherscan_api_key,
            etherscan_api_url,
            etherscan_chain_id,
            heartbeat_interval: secs("HEARTBEAT_INTERVAL_SECS", DEFAULT_HEARTBEAT_INTERVAL_SECS)?,
            heartbeat_timeout: secs("HEARTBEAT_TIMEOUT_SECS", DEFAULT_HEARTBEAT_TIMEOUT_SECS)?,
            reconnect_delay: secs("RECONNECT_DELAY_SECS", DEFAULT_RECONNECT_DELAY_SECS)?,
            verification_grace: secs("VERIFICATION_GRACE_SECS", DEFAULT_VERIFICATION_GRACE_SECS)?,
            max_in_flight,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_interval.is_zero() {
            anyhow::bail!("Heartbeat interval must be greater than zero");
        }
        if self.heartbeat_timeout >= self.heartbeat_interval {
            anyhow::bail!(
                "Heartbeat timeout ({}s) must be shorter than the heartbeat interval ({}s)",
                self.heartbeat_timeout.as_secs(),
                self.heartbeat_interval.as_secs()
            );
        }
        if self.max_in_flight == Some(0) {
            anyhow::bail!("MAX_IN_FLIGHT must be at least 1");
        }
        Ok(())
    }
}

fn validate_ws_url(raw: &str) -> Result<()> {
    let url = Url::parse(raw).with_context(|| format!("Invalid WSS_URL: {raw}"))?;
    match url.scheme() {
        "ws" | "wss" => Ok(()),
        other => anyhow::bail!("WSS_URL must use ws:// or wss://, got {other}://"),
    }
}
