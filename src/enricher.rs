use crate::etherscan::SourceLookup;
use crate::links::{LinkFilter, WebsiteLinks};
use alloy_primitives::Address;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, error};

/// Attaches website links found in a contract's published source.
#[derive(Clone)]
pub struct MetadataEnricher {
    lookup: Arc<dyn SourceLookup>,
    filter: LinkFilter,
}

impl MetadataEnricher {
    pub fn new(lookup: Arc<dyn SourceLookup>) -> Result<Self> {
        Ok(Self {
            lookup,
            filter: LinkFilter::new()?,
        })
    }

    /// Fails when the lookup fails or has no source for `address`; a source with no
    /// usable links is [`WebsiteLinks::NoWebsite`].
    pub async fn websites(&self, address: Address) -> Result<WebsiteLinks> {
        let source = match self.lookup.source_code(address).await {
            Ok(Some(source)) => source,
            Ok(None) => {
                error!(%address, "Contract source code not found");
                anyhow::bail!("Contract source code not found for {:?}", address);
            }
            Err(e) => {
                error!(%address, "Error retrieving contract source code: {:#}", e);
                return Err(e);
            }
        };

        let links = self.filter.website_links(&source);
        debug!(%address, "Websites: {}", links);
        Ok(links)
    }
}
