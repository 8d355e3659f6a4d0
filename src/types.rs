//! Core data types shared by the fetcher, comparator and campaign runner

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FailureReason;
use crate::query::{ProcessingMode, QuerySpec};

/// One log emitted by contract execution, as returned by `eth_getLogs`.
///
/// Coordinates and payload are typed; every other field the node returns
/// (`blockHash`, `transactionHash`, `removed`, ...) is kept verbatim in
/// `extra` and takes part in equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    #[serde(with = "quantity")]
    pub block_number: u64,
    #[serde(with = "quantity")]
    pub transaction_index: u64,
    #[serde(with = "quantity")]
    pub log_index: u64,
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl LogRecord {
    /// Canonical ordering key: (block, tx index, log index)
    pub fn sort_key(&self) -> (u64, u64, u64) {
        (self.block_number, self.transaction_index, self.log_index)
    }

    /// Total order: coordinates first, then content, so records sharing a
    /// key still sort the same way whatever order the node sent them in
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.sort_key()
            .cmp(&other.sort_key())
            .then_with(|| {
                (self.address, &self.topics, &self.data).cmp(&(other.address, &other.topics, &other.data))
            })
            .then_with(|| {
                let opaque = |log: &Self| {
                    log.extra
                        .iter()
                        .map(|(key, value)| (key.clone(), value.to_string()))
                        .collect::<Vec<_>>()
                };
                opaque(self).cmp(&opaque(other))
            })
    }
}

/// Outcome of one request against one endpoint
#[derive(Debug, Clone, PartialEq)]
pub enum EndpointResponse {
    Ok { logs: Vec<LogRecord>, latency: Duration },
    Err { reason: FailureReason, latency: Duration },
}

impl EndpointResponse {
    pub fn latency(&self) -> Duration {
        match self {
            EndpointResponse::Ok { latency, .. } | EndpointResponse::Err { latency, .. } => *latency,
        }
    }

    pub fn logs(&self) -> Option<&[LogRecord]> {
        match self {
            EndpointResponse::Ok { logs, .. } => Some(logs),
            EndpointResponse::Err { .. } => None,
        }
    }

    pub fn log_count(&self) -> Option<usize> {
        self.logs().map(<[LogRecord]>::len)
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            EndpointResponse::Ok { .. } => None,
            EndpointResponse::Err { reason, .. } => Some(reason),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, EndpointResponse::Ok { .. })
    }
}

/// Classification of a reference/candidate response pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Match,
    MismatchCount,
    MismatchContent,
    Error,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Match,
        Status::MismatchCount,
        Status::MismatchContent,
        Status::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Match => "MATCH",
            Status::MismatchCount => "MISMATCH_COUNT",
            Status::MismatchContent => "MISMATCH_CONTENT",
            Status::Error => "ERROR",
        }
    }

    /// Anything other than a match counts against the stop policy
    pub fn is_issue(&self) -> bool {
        !matches!(self, Status::Match)
    }

    pub fn is_mismatch(&self) -> bool {
        matches!(self, Status::MismatchCount | Status::MismatchContent)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of one scenario in one iteration
#[derive(Debug, Clone)]
pub struct ComparisonResult {
    pub iteration: u64,
    pub timestamp: DateTime<Utc>,
    pub scenario_id: String,
    pub description: String,
    pub mode: ProcessingMode,
    pub query: QuerySpec,
    pub reference: EndpointResponse,
    pub candidate: EndpointResponse,
    pub status: Status,
}

/// Iteration that could not run any scenario, e.g. latest block unavailable
#[derive(Debug, Clone)]
pub struct IterationFailure {
    pub iteration: u64,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

/// Hex quantity encoding used by Ethereum JSON-RPC (`"0x1a"`).
/// Plain JSON numbers are accepted on input as some nodes emit them.
pub mod quantity {
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(u64),
    }

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{:x}", value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Num(n) => Ok(n),
            Raw::Str(s) => parse(&s).map_err(de::Error::custom),
        }
    }

    pub fn parse(s: &str) -> Result<u64, String> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| format!("quantity '{}' is missing 0x prefix", s))?;
        if digits.is_empty() {
            return Err(format!("quantity '{}' has no digits", s));
        }
        u64::from_str_radix(digits, 16).map_err(|e| format!("invalid quantity '{}': {}", s, e))
    }
}
