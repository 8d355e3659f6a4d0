//! Error types for the comparator

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ComparatorError>;

/// Application-level errors. These abort the run, unlike [`FailureReason`]
/// which is recorded per scenario and never stops the campaign on its own.
#[derive(Debug, Error)]
pub enum ComparatorError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid scenario definition
    #[error("Invalid scenario '{id}': {reason}")]
    InvalidScenario { id: String, reason: String },

    /// Invalid block range
    #[error("Invalid block range: fromBlock {from} > toBlock {to}")]
    InvalidRange { from: u64, to: u64 },

    /// Result sink error
    #[error("Result sink error: {0}")]
    Sink(String),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Latency histogram could not be created
    #[error("Statistics error: {0}")]
    Statistics(#[from] hdrhistogram::CreationError),
}

/// Why one endpoint failed to produce a log sequence
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    /// Connection refused, DNS failure, timeout or non-2xx HTTP status
    #[error("transport error: {0}")]
    Transport(String),

    /// Endpoint answered with a JSON-RPC error object
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Malformed or unexpected response shape
    #[error("parse error: {0}")]
    Parse(String),
}

impl FailureReason {
    /// Short label used in logs and reports
    pub fn kind(&self) -> &'static str {
        match self {
            FailureReason::Transport(_) => "transport",
            FailureReason::Rpc { .. } => "rpc",
            FailureReason::Parse(_) => "parse",
        }
    }
}

impl From<reqwest::Error> for FailureReason {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FailureReason::Transport(format!("request timed out: {}", e))
        } else if e.is_decode() {
            FailureReason::Parse(e.to_string())
        } else {
            FailureReason::Transport(e.to_string())
        }
    }
}
