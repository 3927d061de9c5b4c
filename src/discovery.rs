use crate::chain::{ChainClient, SharedClient, TransactionRecord};
use crate::enricher::MetadataEnricher;
use crate::models::TokenMetadata;
use crate::output::RecordSink;
use crate::supply::TokenAmount;
use alloy_primitives::{Address, B256};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("no chain connection available")]
    Connection(#[source] BoxError),
    #[error("receipt lookup for {hash} failed")]
    Receipt {
        hash: B256,
        #[source]
        source: BoxError,
    },
    #[error("no receipt for {0}")]
    ReceiptNotFound(B256),
    #[error("successful creation {0} reported no contract address")]
    MissingContractAddress(B256),
    #[error("{call}() on {address} failed")]
    Introspection {
        call: &'static str,
        address: Address,
        #[source]
        source: BoxError,
    },
    #[error("metadata lookup for {address} failed")]
    Metadata {
        address: Address,
        #[source]
        source: BoxError,
    },
    #[error("could not emit token {address}")]
    Sink {
        address: Address,
        #[source]
        source: BoxError,
    },
}

/// The four token reads, taken in one go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub name: String,
    pub symbol: String,
    pub total_supply: TokenAmount,
    pub decimals: u8,
}

/// Probes `address` for the ERC20 metadata interface.
///
/// Calls are made in order and the first failure ends the probe, so nothing
/// after a failing call is attempted.
pub async fn introspect(
    client: &dyn ChainClient,
    address: Address,
) -> Result<TokenInfo, DiscoveryError> {
    let failed = |call: &'static str| {
        move |source: anyhow::Error| DiscoveryError::Introspection {
            call,
            address,
            source: source.into(),
        }
    };

    let name = client.token_name(address).await.map_err(failed("name"))?;
    let symbol = client
        .token_symbol(address)
        .await
        .map_err(failed("symbol"))?;
    let raw_supply = client
        .token_total_supply(address)
        .await
        .map_err(failed("totalSupply"))?;
    let decimals = client
        .token_decimals(address)
        .await
        .map_err(failed("decimals"))?;

    Ok(TokenInfo {
        name,
        symbol,
        total_supply: TokenAmount::new(raw_supply, decimals),
        decimals,
    })
}

/// Turns one contract-creation transaction into a [`TokenMetadata`] record.
pub struct DiscoveryPipeline {
    client: SharedClient,
    enricher: MetadataEnricher,
    sink: Arc<dyn RecordSink>,
    grace_period: Duration,
}

impl DiscoveryPipeline {
    pub fn new(
        client: SharedClient,
        enricher: MetadataEnricher,
        sink: Arc<dyn RecordSink>,
        grace_period: Duration,
    ) -> Self {
        Self {
            client,
            enricher,
            sink,
            grace_period,
        }
    }

    /// `Ok(None)` means the transaction was not a successful deployment and was
    /// skipped. The connection is resolved again after the grace period so a
    /// rebuild in the meantime is picked up.
    pub async fn process(
        &self,
        tx: &TransactionRecord,
    ) -> Result<Option<TokenMetadata>, DiscoveryError> {
        if !tx.is_contract_creation() {
            return Ok(None);
        }

        let client = self
            .client
            .current()
            .map_err(|e| DiscoveryError::Connection(e.into()))?;
        let receipt = client
            .transaction_receipt(tx.hash)
            .await
            .map_err(|e| DiscoveryError::Receipt {
                hash: tx.hash,
                source: e.into(),
            })?
            .ok_or(DiscoveryError::ReceiptNotFound(tx.hash))?;
        drop(client);

        if !receipt.status {
            debug!(tx = %tx.hash, "Contract creation reverted, skipping");
            return Ok(None);
        }

        let address = receipt
            .contract_address
            .ok_or(DiscoveryError::MissingContractAddress(tx.hash))?;

        debug!(
            tx = %tx.hash,
            %address,
            "Contract deployed, waiting {}s for verification",
            self.grace_period.as_secs()
        );
        sleep(self.grace_period).await;

        let client = self
            .client
            .current()
            .map_err(|e| DiscoveryError::Connection(e.into()))?;
        let info = introspect(client.as_ref(), address).await?;

        let websites = self
            .enricher
            .websites(address)
            .await
            .map_err(|e| DiscoveryError::Metadata {
                address,
                source: e.into(),
            })?;

        let token = TokenMetadata {
            address,
            transaction_hash: tx.hash,
            name: info.name,
            symbol: info.symbol,
            decimals: info.decimals,
            total_supply: info.total_supply,
            websites,
        };

        self.sink
            .emit(&token)
            .map_err(|e| DiscoveryError::Sink {
                address,
                source: e.into(),
            })?;
        info!(%address, symbol = %token.symbol, "Token recorded");

        Ok(Some(token))
    }
}
