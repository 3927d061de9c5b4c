use crate::chain::ChainClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct HeartbeatSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug)]
pub enum ProbeOutcome {
    Alive(u64),
    /// The call returned an error in time. The next cycle tries again.
    Failed(anyhow::Error),
    TimedOut,
}

/// Races a block height request against `limit`. Whichever finishes first decides
/// the outcome; the loser is dropped.
pub async fn probe(client: &dyn ChainClient, limit: Duration) -> ProbeOutcome {
    match timeout(limit, client.block_number()).await {
        Ok(Ok(height)) => ProbeOutcome::Alive(height),
        Ok(Err(e)) => ProbeOutcome::Failed(e),
        Err(_) => ProbeOutcome::TimedOut,
    }
}

/// Periodic liveness check of one connection.
///
/// At most one probe loop runs per monitor. Starting again replaces the previous
/// loop, and a timed-out probe ends the loop after notifying its owner once.
pub struct HeartbeatMonitor {
    settings: HeartbeatSettings,
    handle: Option<JoinHandle<()>>,
}

impl HeartbeatMonitor {
    pub fn new(settings: HeartbeatSettings) -> Self {
        Self {
            settings,
            handle: None,
        }
    }

    pub async fn start<F>(&mut self, client: Arc<dyn ChainClient>, on_timeout: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.stop().await;

        let settings = self.settings;
        self.handle = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + settings.interval, settings.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                match probe(client.as_ref(), settings.timeout).await {
                    ProbeOutcome::Alive(height) => debug!(height, "Heartbeat ok"),
                    ProbeOutcome::Failed(e) => warn!("Heartbeat check failed: {:#}", e),
                    ProbeOutcome::TimedOut => {
                        warn!(
                            "Heartbeat timeout after {}s. Connection might be lost.",
                            settings.timeout.as_secs()
                        );
                        on_timeout();
                        return;
                    }
                }
            }
        }));
    }

    /// Cancels the probe loop and waits until it is gone. A probe in flight is
    /// dropped along with it.
    pub async fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}
