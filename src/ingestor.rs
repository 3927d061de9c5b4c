use crate::chain::{BlockStream, SharedClient, TransactionRecord};
use crate::discovery::DiscoveryPipeline;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

/// Why a subscription stopped delivering blocks.
#[derive(Debug)]
pub enum StreamEnd {
    Error(anyhow::Error),
    Closed,
}

/// Fans new blocks out into independent discovery tasks.
///
/// Nothing here awaits a block or a transaction before taking the next one:
/// every block fetch and every discovery runs as its own task on the tracker.
#[derive(Clone)]
pub struct BlockIngestor {
    client: SharedClient,
    pipeline: Arc<DiscoveryPipeline>,
    tasks: TaskTracker,
    limiter: Option<Arc<Semaphore>>,
}

impl BlockIngestor {
    pub fn new(
        client: SharedClient,
        pipeline: Arc<DiscoveryPipeline>,
        max_in_flight: Option<usize>,
    ) -> Self {
        Self {
            client,
            pipeline,
            tasks: TaskTracker::new(),
            limiter: max_in_flight.map(|permits| Arc::new(Semaphore::new(permits))),
        }
    }

    pub fn tasks(&self) -> &TaskTracker {
        &self.tasks
    }

    /// Drains `blocks` until the subscription errors or closes.
    pub async fn listen(&self, mut blocks: BlockStream) -> StreamEnd {
        while let Some(item) = blocks.next().await {
            match item {
                Ok(number) => self.on_block(number),
                Err(e) => return StreamEnd::Error(e),
            }
        }
        StreamEnd::Closed
    }

    pub fn on_block(&self, number: u64) {
        let ingestor = self.clone();
        self.tasks
            .spawn(async move { ingestor.process_block(number).await });
    }

    /// Fetches block `number` and starts a discovery for each contract creation in
    /// it, in transaction order. Failures stay local to this block.
    pub async fn process_block(&self, number: u64) {
        let block = match self.client.current() {
            Ok(client) => client.block_with_transactions(number).await,
            Err(e) => Err(e),
        };

        let block = match block {
            Ok(Some(block)) => block,
            Ok(None) => {
                warn!(block = number, "Block not found");
                return;
            }
            Err(e) => {
                error!(block = number, "Error in block: {:#}", e);
                return;
            }
        };

        let creations: Vec<TransactionRecord> = block
            .transactions
            .into_iter()
            .filter(TransactionRecord::is_contract_creation)
            .collect();

        debug!(
            block = number,
            creations = creations.len(),
            "Scanned block"
        );

        for tx in creations {
            self.spawn_discovery(tx);
        }
    }

    fn spawn_discovery(&self, tx: TransactionRecord) {
        let pipeline = self.pipeline.clone();
        let limiter = self.limiter.clone();

        self.tasks.spawn(async move {
            let _permit = match limiter {
                Some(limiter) => match limiter.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => return,
                },
                None => None,
            };

            if let Err(e) = pipeline.process(&tx).await {
                error!(
                    tx = %tx.hash,
                    "Error in transaction: {:#}",
                    anyhow::Error::from(e)
                );
            }
        });
    }
}
