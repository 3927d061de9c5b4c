use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use token_watcher::chain::SharedClient;
use token_watcher::config::Config;
use token_watcher::discovery::DiscoveryPipeline;
use token_watcher::enricher::MetadataEnricher;
use token_watcher::etherscan::EtherscanClient;
use token_watcher::heartbeat::HeartbeatSettings;
use token_watcher::ingestor::BlockIngestor;
use token_watcher::output::{ConsoleSink, OutputFormat};
use token_watcher::rpc::AlloyConnector;
use token_watcher::supervisor::{ConnectionSupervisor, SupervisorSettings};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "watcher")]
#[command(about = "Report newly deployed ERC20 tokens and their websites", long_about = None)]
struct Cli {
    /// text, table, json or csv
    #[arg(short, long, default_value = "text")]
    format: String,

    #[arg(long)]
    grace_secs: Option<u64>,

    #[arg(long)]
    heartbeat_interval_secs: Option<u64>,

    #[arg(long)]
    heartbeat_timeout_secs: Option<u64>,

    #[arg(long)]
    reconnect_delay_secs: Option<u64>,

    /// Cap on concurrently running discoveries (unbounded when unset)
    #[arg(long)]
    max_in_flight: Option<usize>,
}

impl Cli {
    fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(secs) = self.grace_secs {
            config.verification_grace = Duration::from_secs(secs);
        }
        if let Some(secs) = self.heartbeat_interval_secs {
            config.heartbeat_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.heartbeat_timeout_secs {
            config.heartbeat_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.reconnect_delay_secs {
            config.reconnect_delay = Duration::from_secs(secs);
        }
        if self.max_in_flight.is_some() {
            config.max_in_flight = self.max_in_flight;
        }
        config.validate()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    info!("Starting token watcher");

    let mut config = Config::from_env()?;
    cli.apply(&mut config)?;
    info!("Configuration loaded");
    info!(
        "Grace period {}s, heartbeat every {}s (timeout {}s), reconnect delay {}s",
        config.verification_grace.as_secs(),
        config.heartbeat_interval.as_secs(),
        config.heartbeat_timeout.as_secs(),
        config.reconnect_delay.as_secs()
    );

    let etherscan = EtherscanClient::new(
        &config.etherscan_api_url,
        &config.etherscan_api_key,
        config.etherscan_chain_id,
    );
    let enricher = MetadataEnricher::new(Arc::new(etherscan))?;
    let sink = Arc::new(ConsoleSink::new(OutputFormat::from(cli.format.as_str())));

    let (current, client) = SharedClient::channel();
    let pipeline = Arc::new(DiscoveryPipeline::new(
        client.clone(),
        enricher,
        sink,
        config.verification_grace,
    ));
    let ingestor = BlockIngestor::new(client, pipeline, config.max_in_flight);

    let supervisor = ConnectionSupervisor::new(
        Arc::new(AlloyConnector::new(&config.ws_url)),
        ingestor,
        current,
        SupervisorSettings {
            heartbeat: HeartbeatSettings {
                interval: config.heartbeat_interval,
                timeout: config.heartbeat_timeout,
            },
            reconnect_delay: config.reconnect_delay,
        },
    );

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            signal.cancel();
        }
    });

    if let Err(e) = supervisor.run(shutdown).await {
        error!("Watcher error: {:#}", e);
        return Err(e);
    }

    Ok(())
}
