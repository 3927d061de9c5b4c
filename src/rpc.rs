use crate::chain::{
    BlockRecord, BlockStream, ChainClient, Connector, ContractReceipt, TransactionRecord,
};
use crate::contracts::IERC20Metadata;
use alloy::network::{ReceiptResponse, TransactionResponse};
use alloy::providers::{DynProvider, Provider, ProviderBuilder, WsConnect};
use alloy::rpc::types::BlockNumberOrTag;
use alloy_primitives::{Address, B256, U256};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Dials the node's WebSocket endpoint.
#[derive(Debug, Clone)]
pub struct AlloyConnector {
    ws_url: String,
}

impl AlloyConnector {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
        }
    }
}

#[async_trait]
impl Connector for AlloyConnector {
    async fn connect(&self) -> Result<Arc<dyn ChainClient>> {
        info!("Connecting to {}", self.ws_url);

        let ws = WsConnect::new(self.ws_url.clone());
        let provider = timeout(CONNECT_TIMEOUT, ProviderBuilder::new().connect_ws(ws))
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "WebSocket connect to {} timed out after {} seconds",
                    self.ws_url,
                    CONNECT_TIMEOUT.as_secs()
                )
            })?
            .with_context(|| format!("WebSocket connect to {} failed", self.ws_url))?;

        Ok(Arc::new(AlloyChain {
            provider: provider.erased(),
        }))
    }
}

/// A single WebSocket connection backed by an alloy provider.
#[derive(Clone)]
pub struct AlloyChain {
    provider: DynProvider,
}

impl AlloyChain {
    fn token(&self, address: Address) -> IERC20Metadata::IERC20MetadataInstance<DynProvider> {
        IERC20Metadata::new(address, self.provider.clone())
    }
}

/// A notification that cannot be decoded is reported as a connection error.
fn head_numbers<S, E>(heads: S) -> BlockStream
where
    S: Stream<Item = std::result::Result<u64, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    heads
        .map(|head| head.context("Malformed newHeads notification"))
        .boxed()
}

#[async_trait]
impl ChainClient for AlloyChain {
    async fn block_number(&self) -> Result<u64> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn block_with_transactions(&self, number: u64) -> Result<Option<BlockRecord>> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(number))
            .full()
            .await?;

        let Some(block) = block else {
            return Ok(None);
        };

        let transactions: Vec<TransactionRecord> = block
            .transactions
            .into_transactions()
            .map(|tx| TransactionRecord {
                hash: TransactionResponse::tx_hash(&tx),
                to: alloy::consensus::Transaction::to(&tx),
            })
            .collect();

        debug!(
            "Fetched block {} with {} transactions",
            number,
            transactions.len()
        );

        Ok(Some(BlockRecord { transactions }))
    }

    async fn transaction_receipt(&self, hash: B256) -> Result<Option<ContractReceipt>> {
        let receipt = self.provider.get_transaction_receipt(hash).await?;

        Ok(receipt.map(|receipt| ContractReceipt {
            contract_address: ReceiptResponse::contract_address(&receipt),
            status: ReceiptResponse::status(&receipt),
        }))
    }

    async fn subscribe_blocks(&self) -> Result<BlockStream> {
        let subscription = self
            .provider
            .subscribe_blocks()
            .await
            .context("newHeads subscription failed")?;

        Ok(head_numbers(
            subscription
                .into_result_stream()
                .map(|header| header.map(|header| header.number)),
        ))
    }

    async fn token_name(&self, address: Address) -> Result<String> {
        Ok(self.token(address).name().call().await?)
    }

    async fn token_symbol(&self, address: Address) -> Result<String> {
        Ok(self.token(address).symbol().call().await?)
    }

    async fn token_total_supply(&self, address: Address) -> Result<U256> {
        Ok(self.token(address).totalSupply().call().await?)
    }

    async fn token_decimals(&self, address: Address) -> Result<u8> {
        Ok(self.token(address).decimals().call().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn undecodable_head_ends_as_error() {
        let bad = serde_json::from_str::<u64>("\"0xzz\"").unwrap_err();
        let mut heads = head_numbers(futures::stream::iter(vec![Ok(7), Err(bad)]));

        assert_eq!(heads.next().await.unwrap().unwrap(), 7);
        let err = heads.next().await.unwrap().unwrap_err();
        assert!(err.to_string().contains("Malformed newHeads"));
        assert!(heads.next().await.is_none());
    }
}
