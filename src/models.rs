use crate::links::WebsiteLinks;
use crate::supply::TokenAmount;
use alloy_primitives::{Address, B256};
use serde::Serialize;

/// A newly deployed token, emitted once and then dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenMetadata {
    pub address: Address,
    pub transaction_hash: B256,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: TokenAmount,
    pub websites: WebsiteLinks,
}
