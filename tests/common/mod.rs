#![allow(dead_code)]

use alloy_primitives::{Address, B256, U256};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use token_watcher::chain::{
    BlockRecord, BlockStream, ChainClient, Connector, ContractReceipt, SharedClient,
    TransactionRecord,
};
use token_watcher::discovery::DiscoveryPipeline;
use token_watcher::enricher::MetadataEnricher;
use token_watcher::etherscan::SourceLookup;
use token_watcher::models::TokenMetadata;
use token_watcher::output::ChannelSink;
use tokio::sync::{broadcast, mpsc, watch};

pub type Feed = broadcast::Sender<Result<u64, String>>;

#[derive(Debug, Clone)]
pub struct MockToken {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub total_supply: Option<U256>,
    pub decimals: Option<u8>,
}

impl MockToken {
    pub fn erc20(name: &str, symbol: &str, total_supply: U256, decimals: u8) -> Self {
        Self {
            name: Some(name.to_string()),
            symbol: Some(symbol.to_string()),
            total_supply: Some(total_supply),
            decimals: Some(decimals),
        }
    }
}

/// In-memory node. Blocks are pushed through `feed`; an `Err` item on the feed
/// reports a connection error and dropping every sender closes the stream.
#[derive(Default)]
pub struct MockChain {
    pub calls: Mutex<Vec<String>>,
    blocks: Mutex<HashMap<u64, BlockRecord>>,
    receipts: Mutex<HashMap<B256, ContractReceipt>>,
    tokens: Mutex<HashMap<Address, MockToken>>,
    feed: Mutex<Option<Feed>>,
    pub probes: AtomicUsize,
    pub hang_probes: AtomicBool,
    pub fail_probes: AtomicBool,
}

impl MockChain {
    pub fn new() -> Arc<Self> {
        let (feed, _) = broadcast::channel(64);
        let chain = Self::default();
        *chain.feed.lock().unwrap() = Some(feed);
        Arc::new(chain)
    }

    pub fn feed(&self) -> Feed {
        self.feed.lock().unwrap().clone().expect("feed closed")
    }

    /// Drops the chain's own sender so that the stream ends once test-held
    /// senders are gone too.
    pub fn close_feed(&self) {
        self.feed.lock().unwrap().take();
    }

    pub fn subscribers(&self) -> usize {
        self.feed
            .lock()
            .unwrap()
            .as_ref()
            .map_or(0, |feed| feed.receiver_count())
    }

    pub fn push_block(&self, number: u64) {
        let _ = self.feed().send(Ok(number));
    }

    pub fn add_block(&self, number: u64, transactions: Vec<TransactionRecord>) {
        self.blocks
            .lock()
            .unwrap()
            .insert(number, BlockRecord { transactions });
    }

    pub fn add_receipt(&self, hash: B256, contract_address: Option<Address>, status: bool) {
        self.receipts.lock().unwrap().insert(
            hash,
            ContractReceipt {
                contract_address,
                status,
            },
        );
    }

    pub fn add_token(&self, address: Address, token: MockToken) {
        self.tokens.lock().unwrap().insert(address, token);
    }

    /// Wires a deployment of `token` at `address` by transaction `hash`.
    pub fn deploy(&self, hash: B256, address: Address, token: MockToken) {
        self.add_receipt(hash, Some(address), true);
        self.add_token(address, token);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_named(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn token(&self, address: Address) -> Result<MockToken> {
        self.tokens
            .lock()
            .unwrap()
            .get(&address)
            .cloned()
            .ok_or_else(|| anyhow!("execution reverted"))
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn block_number(&self) -> Result<u64> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.hang_probes.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        if self.fail_probes.load(Ordering::SeqCst) {
            return Err(anyhow!("connection reset"));
        }
        Ok(1)
    }

    async fn block_with_transactions(&self, number: u64) -> Result<Option<BlockRecord>> {
        self.record(format!("block:{number}"));
        if number == u64::MAX {
            return Err(anyhow!("header not found"));
        }
        Ok(self.blocks.lock().unwrap().get(&number).cloned())
    }

    async fn transaction_receipt(&self, hash: B256) -> Result<Option<ContractReceipt>> {
        self.record(format!("receipt:{hash}"));
        Ok(self.receipts.lock().unwrap().get(&hash).cloned())
    }

    async fn subscribe_blocks(&self) -> Result<BlockStream> {
        let rx = self.feed().subscribe();
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(Ok(number)) => return Some((Ok(number), rx)),
                    Ok(Err(reason)) => return Some((Err(anyhow!(reason)), rx)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(stream.boxed())
    }

    async fn token_name(&self, address: Address) -> Result<String> {
        self.record("name".to_string());
        self.token(address)?
            .name
            .ok_or_else(|| anyhow!("execution reverted"))
    }

    async fn token_symbol(&self, address: Address) -> Result<String> {
        self.record("symbol".to_string());
        self.token(address)?
            .symbol
            .ok_or_else(|| anyhow!("execution reverted"))
    }

    async fn token_total_supply(&self, address: Address) -> Result<U256> {
        self.record("totalSupply".to_string());
        self.token(address)?
            .total_supply
            .ok_or_else(|| anyhow!("execution reverted"))
    }

    async fn token_decimals(&self, address: Address) -> Result<u8> {
        self.record("decimals".to_string());
        self.token(address)?
            .decimals
            .ok_or_else(|| anyhow!("execution reverted"))
    }
}

/// Hands out the queued chains in order, then keeps returning the last one.
pub struct MockConnector {
    chains: Mutex<VecDeque<Arc<MockChain>>>,
    last: Mutex<Option<Arc<MockChain>>>,
    pub connects: AtomicUsize,
    pub failures_left: AtomicUsize,
}

impl MockConnector {
    pub fn new(chains: Vec<Arc<MockChain>>) -> Arc<Self> {
        Arc::new(Self {
            chains: Mutex::new(chains.into()),
            last: Mutex::new(None),
            connects: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(0),
        })
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<Arc<dyn ChainClient>> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(anyhow!("connection refused"));
        }

        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.chains.lock().unwrap().pop_front() {
            *last = Some(next);
        }
        let chain = last.clone().ok_or_else(|| anyhow!("no chain configured"))?;
        Ok(chain as Arc<dyn ChainClient>)
    }
}

#[derive(Default)]
pub struct MockSource {
    sources: Mutex<HashMap<Address, Result<Option<String>, String>>>,
    pub lookups: AtomicUsize,
}

impl MockSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn verified(&self, address: Address, source: &str) {
        self.sources
            .lock()
            .unwrap()
            .insert(address, Ok(Some(source.to_string())));
    }

    pub fn failing(&self, address: Address, reason: &str) {
        self.sources
            .lock()
            .unwrap()
            .insert(address, Err(reason.to_string()));
    }
}

#[async_trait]
impl SourceLookup for MockSource {
    async fn source_code(&self, address: Address) -> Result<Option<String>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        match self.sources.lock().unwrap().get(&address) {
            Some(Ok(source)) => Ok(source.clone()),
            Some(Err(reason)) => Err(anyhow!(reason.clone())),
            None => Ok(None),
        }
    }
}

pub fn creation(seed: u8) -> TransactionRecord {
    TransactionRecord {
        hash: B256::repeat_byte(seed),
        to: None,
    }
}

pub fn transfer(seed: u8) -> TransactionRecord {
    TransactionRecord {
        hash: B256::repeat_byte(seed),
        to: Some(Address::repeat_byte(0xee)),
    }
}

pub fn contract(seed: u8) -> Address {
    Address::repeat_byte(seed)
}

/// A current-connection channel already pointing at `chain`.
pub fn shared(
    chain: Arc<MockChain>,
) -> (watch::Sender<Option<Arc<dyn ChainClient>>>, SharedClient) {
    let (current, client) = SharedClient::channel();
    current.send_replace(Some(chain as Arc<dyn ChainClient>));
    (current, client)
}

pub fn pipeline(
    client: SharedClient,
    source: Arc<MockSource>,
    grace: std::time::Duration,
) -> (Arc<DiscoveryPipeline>, mpsc::UnboundedReceiver<TokenMetadata>) {
    let (sink, records) = ChannelSink::new();
    let enricher = MetadataEnricher::new(source).unwrap();
    (
        Arc::new(DiscoveryPipeline::new(client, enricher, Arc::new(sink), grace)),
        records,
    )
}
