use anyhow::Result;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;

const URL_PATTERN: &str = r"https?://[A-Za-z0-9_\-._~:/?#\[\]@!$&'()*+,;=%]+";

pub const NO_WEBSITE: &str = "No website link available";

/// Links that show up in almost every verified contract and say nothing about
/// the project itself.
const EXCLUDED_PREFIXES: &[&str] = &[
    "https://eips.ethereum.org",
    "https://solidity.readthedocs.io",
    "https://github.com",
    "https://gitbook.com",
    "https://hardhat.org",
    "https://forum.zeppelin",
    "https://forum.openzeppelin",
    "https://diligence.consensys",
    "https://blog.",
    "https://consensys.",
    "https://docs.",
    "https://cs.",
    "https://web3js.",
    "https://ethereum.github",
    "https://https.eth.wiki",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebsiteLinks {
    Found(Vec<String>),
    /// Nothing survived the filter. Informational, not an error.
    NoWebsite,
}

impl WebsiteLinks {
    pub fn as_strings(&self) -> Vec<&str> {
        match self {
            WebsiteLinks::Found(links) => links.iter().map(String::as_str).collect(),
            WebsiteLinks::NoWebsite => vec![NO_WEBSITE],
        }
    }
}

impl fmt::Display for WebsiteLinks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_strings().join(", "))
    }
}

impl Serialize for WebsiteLinks {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_strings().serialize(serializer)
    }
}

#[derive(Debug, Clone)]
pub struct LinkFilter {
    pattern: Regex,
}

impl LinkFilter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(URL_PATTERN)?,
        })
    }

    /// Every URL in `source` in order of appearance, minus the denylisted ones.
    pub fn website_links(&self, source: &str) -> WebsiteLinks {
        let links: Vec<String> = self
            .pattern
            .find_iter(source)
            .map(|m| m.as_str())
            .filter(|link| !EXCLUDED_PREFIXES.iter().any(|prefix| link.starts_with(prefix)))
            .map(str::to_string)
            .collect();

        if links.is_empty() {
            WebsiteLinks::NoWebsite
        } else {
            WebsiteLinks::Found(links)
        }
    }
}
