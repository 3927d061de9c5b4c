use crate::models::TokenMetadata;
use anyhow::{Context, Result};
use comfy_table::{Cell, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use csv::Writer;
use tokio::sync::mpsc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Table,
    Json,
    Csv,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "table" => OutputFormat::Table,
            "json" => OutputFormat::Json,
            "csv" => OutputFormat::Csv,
            _ => OutputFormat::Text,
        }
    }
}

pub fn format_token(token: &TokenMetadata, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_token_text(token),
        OutputFormat::Table => format_token_table(token),
        OutputFormat::Json => serde_json::to_string_pretty(token).unwrap_or_default(),
        OutputFormat::Csv => format_token_csv(token),
    }
}

fn format_token_text(token: &TokenMetadata) -> String {
    format!(
        "New Token Found:\n\
         \x20   - Token Address: {:?}\n\
         \x20   - Token Name: {}\n\
         \x20   - Token Symbol: {}\n\
         \x20   - Total Supply: {}\n\
         \x20   - Decimals: {}\n\
         \x20   - Websites: {}",
        token.address,
        token.name,
        token.symbol,
        token.total_supply,
        token.decimals,
        token.websites,
    )
}

fn format_token_table(token: &TokenMetadata) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec!["Field", "Value"]);

    table.add_row(vec![Cell::new("Address"), Cell::new(format!("{:?}", token.address))]);
    table.add_row(vec![Cell::new("Name"), Cell::new(&token.name)]);
    table.add_row(vec![Cell::new("Symbol"), Cell::new(&token.symbol)]);
    table.add_row(vec![Cell::new("Total Supply"), Cell::new(token.total_supply)]);
    table.add_row(vec![Cell::new("Decimals"), Cell::new(token.decimals)]);
    table.add_row(vec![
        Cell::new("Websites"),
        Cell::new(token.websites.as_strings().join("\n")),
    ]);
    table.add_row(vec![
        Cell::new("Deploy Tx"),
        Cell::new(format!("{:?}", token.transaction_hash)),
    ]);

    table.to_string()
}

fn format_token_csv(token: &TokenMetadata) -> String {
    let mut wtr = Writer::from_writer(vec![]);

    let _ = wtr.write_record([
        "address",
        "name",
        "symbol",
        "total_supply",
        "total_supply_raw",
        "decimals",
        "websites",
        "transaction_hash",
    ]);
    let _ = wtr.write_record([
        &format!("{:?}", token.address),
        &token.name,
        &token.symbol,
        &token.total_supply.to_string(),
        &token.total_supply.raw.to_string(),
        &token.decimals.to_string(),
        &token.websites.as_strings().join(" "),
        &format!("{:?}", token.transaction_hash),
    ]);

    String::from_utf8(wtr.into_inner().unwrap_or_default()).unwrap_or_default()
}

/// Destination for discovered tokens.
pub trait RecordSink: Send + Sync {
    fn emit(&self, token: &TokenMetadata) -> Result<()>;
}

/// Prints every record to stdout.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleSink {
    format: OutputFormat,
}

impl ConsoleSink {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl RecordSink for ConsoleSink {
    fn emit(&self, token: &TokenMetadata) -> Result<()> {
        info!(address = ?token.address, symbol = %token.symbol, "New token found");
        println!("{}", format_token(token, self.format));
        Ok(())
    }
}

/// Hands records to whoever holds the receiving end.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<TokenMetadata>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TokenMetadata>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl RecordSink for ChannelSink {
    fn emit(&self, token: &TokenMetadata) -> Result<()> {
        self.tx
            .send(token.clone())
            .ok()
            .context("Token receiver has been dropped")
    }
}
