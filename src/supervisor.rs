use crate::chain::{BlockStream, ChainClient, Connector};
use crate::heartbeat::{HeartbeatMonitor, HeartbeatSettings};
use crate::ingestor::{BlockIngestor, StreamEnd};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_retry::Retry;
use tokio_retry::strategy::FixedInterval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Active,
    Reconnecting,
}

#[derive(Debug, Clone, Copy)]
pub struct SupervisorSettings {
    pub heartbeat: HeartbeatSettings,
    pub reconnect_delay: Duration,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            heartbeat: HeartbeatSettings::default(),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug)]
enum Trigger {
    Error(anyhow::Error),
    Closed,
    HeartbeatTimeout,
}

/// Raised by the tasks attached to connection number `generation`.
#[derive(Debug)]
struct ConnectionEvent {
    generation: u64,
    trigger: Trigger,
}

/// Owns the node connection: the one block listener, the one heartbeat and the
/// handle the discovery pipelines read the current connection from.
///
/// Every install bumps the generation. Events from older generations are dropped,
/// so a failure that is reported twice (say a close right after a heartbeat
/// timeout) still causes a single rebuild.
pub struct ConnectionSupervisor {
    connector: Arc<dyn Connector>,
    ingestor: BlockIngestor,
    heartbeat: HeartbeatMonitor,
    current: watch::Sender<Option<Arc<dyn ChainClient>>>,
    listener: Option<JoinHandle<()>>,
    generation: u64,
    state: ConnectionState,
    reconnect_delay: Duration,
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
    events_rx: mpsc::UnboundedReceiver<ConnectionEvent>,
}

impl ConnectionSupervisor {
    pub fn new(
        connector: Arc<dyn Connector>,
        ingestor: BlockIngestor,
        current: watch::Sender<Option<Arc<dyn ChainClient>>>,
        settings: SupervisorSettings,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            connector,
            ingestor,
            heartbeat: HeartbeatMonitor::new(settings.heartbeat),
            current,
            listener: None,
            generation: 0,
            state: ConnectionState::Disconnected,
            reconnect_delay: settings.reconnect_delay,
            events_tx,
            events_rx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn heartbeat_running(&self) -> bool {
        self.heartbeat.is_running()
    }

    /// Subscribes on `client` and makes it the active connection, replacing
    /// whatever listener and heartbeat were there before.
    pub async fn initialize(&mut self, client: Arc<dyn ChainClient>) -> Result<()> {
        self.detach().await;
        let blocks = client
            .subscribe_blocks()
            .await
            .context("Block subscription failed")?;
        self.install(client, blocks).await;
        Ok(())
    }

    /// Connects, then keeps the subscription alive until `shutdown` fires.
    ///
    /// Only a failure of the very first connection is returned as an error;
    /// later failures are retried forever.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
        self.state = ConnectionState::Connecting;
        let client = self
            .connector
            .connect()
            .await
            .context("Initial connection failed")?;
        self.initialize(client).await?;
        info!("Watching for new contract deployments");

        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = self.events_rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            if event.generation != self.generation {
                debug!(
                    generation = event.generation,
                    current = self.generation,
                    "Ignoring event from a replaced connection"
                );
                continue;
            }

            match event.trigger {
                Trigger::Error(e) => error!("WebSocket error: {:#}", e),
                Trigger::Closed => error!("WebSocket closed"),
                Trigger::HeartbeatTimeout => warn!("Connection unresponsive, rebuilding"),
            }

            if !self.reconnect(&shutdown).await? {
                break;
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Returns `false` when shutdown interrupted the reconnect.
    async fn reconnect(&mut self, shutdown: &CancellationToken) -> Result<bool> {
        self.detach().await;
        self.state = ConnectionState::Reconnecting;

        tokio::select! {
            _ = shutdown.cancelled() => return Ok(false),
            _ = sleep(self.reconnect_delay) => {}
        }

        self.state = ConnectionState::Connecting;
        let connector = self.connector.clone();
        #[allow(deprecated)]
        let attempts = Retry::spawn(FixedInterval::new(self.reconnect_delay), move || {
            open(connector.clone())
        });

        let (client, blocks) = tokio::select! {
            _ = shutdown.cancelled() => return Ok(false),
            connection = attempts => connection.context("Reconnect attempts exhausted")?,
        };

        self.install(client, blocks).await;
        info!(generation = self.generation, "Reconnected");
        Ok(true)
    }

    async fn install(&mut self, client: Arc<dyn ChainClient>, blocks: BlockStream) {
        self.detach().await;

        self.generation += 1;
        let generation = self.generation;
        self.current.send_replace(Some(client.clone()));

        let ingestor = self.ingestor.clone();
        let events = self.events_tx.clone();
        self.listener = Some(tokio::spawn(async move {
            let trigger = match ingestor.listen(blocks).await {
                StreamEnd::Error(e) => Trigger::Error(e),
                StreamEnd::Closed => Trigger::Closed,
            };
            let _ = events.send(ConnectionEvent {
                generation,
                trigger,
            });
        }));

        let events = self.events_tx.clone();
        self.heartbeat
            .start(client, move || {
                let _ = events.send(ConnectionEvent {
                    generation,
                    trigger: Trigger::HeartbeatTimeout,
                });
            })
            .await;

        self.state = ConnectionState::Active;
        debug!(generation, "Connection installed");
    }

    /// Stops block delivery from the current connection and its heartbeat. The
    /// old stream is dropped by the time this returns.
    async fn detach(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
            let _ = listener.await;
        }
        self.heartbeat.stop().await;
    }

    async fn shutdown(&mut self) {
        self.detach().await;
        self.state = ConnectionState::Disconnected;

        let tasks = self.ingestor.tasks();
        tasks.close();
        if !tasks.is_empty() {
            warn!("Abandoning {} in-flight discovery task(s)", tasks.len());
        }
        info!("Supervisor stopped");
    }
}

async fn open(connector: Arc<dyn Connector>) -> Result<(Arc<dyn ChainClient>, BlockStream)> {
    let connection = async {
        let client = connector.connect().await?;
        let blocks = client.subscribe_blocks().await?;
        Ok::<_, anyhow::Error>((client, blocks))
    }
    .await;

    if let Err(e) = &connection {
        warn!("Reconnect attempt failed: {:#}", e);
    }
    connection
}
