use alloy_primitives::{Address, B256, U256};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;
use tokio::sync::watch;

/// New block numbers pushed by a live subscription.
///
/// An `Err` item is the provider reporting an error on the connection and the end
/// of the stream means the connection was closed. Either way the subscription is
/// considered dead.
pub type BlockStream = BoxStream<'static, Result<u64>>;

#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub hash: B256,
    pub to: Option<Address>,
}

impl TransactionRecord {
    /// A transaction without a destination deploys new code.
    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct BlockRecord {
    pub transactions: Vec<TransactionRecord>,
}

#[derive(Debug, Clone)]
pub struct ContractReceipt {
    pub contract_address: Option<Address>,
    pub status: bool,
}

/// One live connection to a chain node.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn block_number(&self) -> Result<u64>;

    async fn block_with_transactions(&self, number: u64) -> Result<Option<BlockRecord>>;

    async fn transaction_receipt(&self, hash: B256) -> Result<Option<ContractReceipt>>;

    async fn subscribe_blocks(&self) -> Result<BlockStream>;

    async fn token_name(&self, address: Address) -> Result<String>;

    async fn token_symbol(&self, address: Address) -> Result<String>;

    async fn token_total_supply(&self, address: Address) -> Result<U256>;

    async fn token_decimals(&self, address: Address) -> Result<u8>;
}

/// Opens fresh connections to the node. Called once at startup and again for
/// every rebuild.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn ChainClient>>;
}

/// Read side of the currently installed connection.
///
/// Only the supervisor holds the write side; everything else resolves the
/// connection at the moment it needs it.
#[derive(Clone)]
pub struct SharedClient {
    rx: watch::Receiver<Option<Arc<dyn ChainClient>>>,
}

impl SharedClient {
    pub fn channel() -> (watch::Sender<Option<Arc<dyn ChainClient>>>, Self) {
        let (tx, rx) = watch::channel(None);
        (tx, Self { rx })
    }

    pub fn current(&self) -> Result<Arc<dyn ChainClient>> {
        self.rx
            .borrow()
            .clone()
            .ok_or_else(|| anyhow!("No chain connection has been established yet"))
    }
}
