pub mod chain;
pub mod config;
pub mod contracts;
pub mod discovery;
pub mod enricher;
pub mod etherscan;
pub mod heartbeat;
pub mod ingestor;
pub mod links;
pub mod models;
pub mod output;
pub mod rpc;
pub mod supervisor;
pub mod supply;
