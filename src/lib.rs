//! Differential correctness tester for `eth_getLogs`.
//!
//! The same log query is sent to a reference node and a candidate node; both
//! responses are put into canonical order and classified as a match, a count
//! mismatch, a content mismatch or an error. A campaign repeats a battery of
//! such scenarios over sliding block windows and records every comparison.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use getlogs_comparator::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = CampaignConfig::from_file(std::path::Path::new("campaign.json"))?;
//!     let source = RpcClient::new(&config.reference_url, &config.candidate_url, config.request_timeout)?;
//!     let sink = CsvSink::open(&config.output)?;
//!     let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//!     let outcome = CampaignRunner::new(config, Arc::new(source), sink, shutdown_rx)?
//!         .run()
//!         .await;
//!     println!("{} iterations, exit code {}", outcome.state.iterations_completed, outcome.exit_code());
//!     Ok(())
//! }
//! ```

pub mod campaign;
pub mod cli;
pub mod compare;
pub mod config;
pub mod error;
pub mod normalize;
pub mod query;
pub mod report;
pub mod rpc;
pub mod scenarios;
pub mod sink;
pub mod stats;
pub mod types;

pub use campaign::{CampaignOutcome, CampaignPhase, CampaignRunner, CampaignState, StopReason};
pub use compare::compare;
pub use config::CampaignConfig;
pub use error::{ComparatorError, FailureReason, Result};
pub use normalize::normalize;
pub use query::{QuerySpec, ScenarioTemplate};
pub use rpc::{LogSource, RpcClient, Side};
pub use sink::{CsvSink, MemorySink, ResultSink};
pub use types::{ComparisonResult, EndpointResponse, LogRecord, Status};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::campaign::{CampaignOutcome, CampaignPhase, CampaignRunner, StopReason};
    pub use crate::compare::compare;
    pub use crate::config::CampaignConfig;
    pub use crate::error::{ComparatorError, FailureReason, Result};
    pub use crate::normalize::normalize;
    pub use crate::query::{QuerySpec, ScenarioTemplate};
    pub use crate::rpc::{LogSource, RpcClient, Side};
    pub use crate::sink::{CsvSink, MemorySink, ResultSink};
    pub use crate::types::{EndpointResponse, LogRecord, Status};
}
