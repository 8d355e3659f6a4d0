//! Request builder: scenario templates resolved against the latest block

use std::fmt;

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use crate::error::{ComparatorError, Result};
use crate::types::quantity;

/// `address` filter of an `eth_getLogs` query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AddressFilter {
    Single(Address),
    Any(Vec<Address>),
}

/// One position of the `topics` filter; `null` positions are wildcards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TopicFilter {
    Single(B256),
    Any(Vec<B256>),
}

/// Fully resolved `eth_getLogs` filter object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    #[serde(with = "quantity")]
    from_block: u64,
    #[serde(with = "quantity")]
    to_block: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<AddressFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    topics: Option<Vec<Option<TopicFilter>>>,
}

impl QuerySpec {
    pub fn new(from_block: u64, to_block: u64) -> Result<Self> {
        if from_block > to_block {
            return Err(ComparatorError::InvalidRange { from: from_block, to: to_block });
        }
        Ok(Self { from_block, to_block, address: None, topics: None })
    }

    pub fn with_address(mut self, address: Option<AddressFilter>) -> Self {
        self.address = address;
        self
    }

    pub fn with_topics(mut self, topics: Option<Vec<Option<TopicFilter>>>) -> Self {
        self.topics = topics;
        self
    }

    pub fn from_block(&self) -> u64 {
        self.from_block
    }

    pub fn to_block(&self) -> u64 {
        self.to_block
    }

    pub fn address(&self) -> Option<&AddressFilter> {
        self.address.as_ref()
    }

    pub fn topics(&self) -> Option<&[Option<TopicFilter>]> {
        self.topics.as_deref()
    }

    /// Number of blocks covered, both ends inclusive
    pub fn span(&self) -> u64 {
        self.to_block - self.from_block + 1
    }
}

/// Query strategy the node under test selects by range size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMode {
    Cached,
    Range,
}

impl ProcessingMode {
    pub fn classify(span: u64, range_threshold: u64) -> Self {
        if span > range_threshold {
            ProcessingMode::Range
        } else {
            ProcessingMode::Cached
        }
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingMode::Cached => f.write_str("cached"),
            ProcessingMode::Range => f.write_str("range"),
        }
    }
}

/// Scenario with block offsets relative to the latest block.
///
/// `from_offset = 99, to_offset = 0` covers the latest 100 blocks. Windows
/// slide forward because offsets are re-resolved every iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioTemplate {
    pub id: String,
    pub description: String,
    pub from_offset: u64,
    #[serde(default)]
    pub to_offset: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<AddressFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<Option<TopicFilter>>>,
}

impl ScenarioTemplate {
    pub fn new(id: impl Into<String>, description: impl Into<String>, from_offset: u64, to_offset: u64) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            from_offset,
            to_offset,
            address: None,
            topics: None,
        }
    }

    pub fn with_topics(mut self, topics: Vec<Option<TopicFilter>>) -> Self {
        self.topics = Some(topics);
        self
    }

    pub fn with_address(mut self, address: AddressFilter) -> Self {
        self.address = Some(address);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(ComparatorError::InvalidScenario {
                id: self.id.clone(),
                reason: "scenario id must not be empty".to_string(),
            });
        }
        if self.from_offset < self.to_offset {
            return Err(ComparatorError::InvalidScenario {
                id: self.id.clone(),
                reason: format!(
                    "from_offset {} must be >= to_offset {}",
                    self.from_offset, self.to_offset
                ),
            });
        }
        Ok(())
    }

    /// Block span of the window, independent of the latest block
    pub fn span(&self) -> u64 {
        self.from_offset.saturating_sub(self.to_offset) + 1
    }

    /// Resolve against a freshly fetched latest block
    pub fn resolve(&self, latest_block: u64) -> Result<QuerySpec> {
        self.validate()?;
        let from_block = latest_block.saturating_sub(self.from_offset);
        let to_block = latest_block.saturating_sub(self.to_offset);
        Ok(QuerySpec::new(from_block, to_block)?
            .with_address(self.address.clone())
            .with_topics(self.topics.clone()))
    }
}
