//! Result sinks: durable per-comparison records plus running tallies

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::query::ProcessingMode;
use crate::types::{ComparisonResult, EndpointResponse, IterationFailure, Status};

/// Written in place of counts and latencies for a side that failed
pub const FAILURE_MARKER: &str = "ERR";

/// Scenario id used for rows that record an iteration-level failure
pub const ITERATION_FAILURE_ID: &str = "latest_block";

/// Aggregate counts readable back from a sink
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub by_status: BTreeMap<Status, u64>,
    /// Mismatches and errors per processing mode
    #[serde(default)]
    pub issues_by_mode: BTreeMap<ProcessingMode, u64>,
    pub iteration_failures: u64,
}

impl Tally {
    pub fn add(&mut self, status: Status) {
        *self.by_status.entry(status).or_insert(0) += 1;
    }

    pub fn add_result(&mut self, result: &ComparisonResult) {
        self.add(result.status);
        if result.status.is_issue() {
            *self.issues_by_mode.entry(result.mode).or_insert(0) += 1;
        }
    }

    pub fn issues_in(&self, mode: ProcessingMode) -> u64 {
        self.issues_by_mode.get(&mode).copied().unwrap_or(0)
    }

    pub fn count(&self, status: Status) -> u64 {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn comparisons(&self) -> u64 {
        self.by_status.values().sum()
    }

    pub fn mismatches(&self) -> u64 {
        self.count(Status::MismatchCount) + self.count(Status::MismatchContent)
    }

    /// Scenario errors plus iterations that could not run at all
    pub fn errors(&self) -> u64 {
        self.count(Status::Error) + self.iteration_failures
    }

    pub fn has_issues(&self) -> bool {
        self.mismatches() > 0 || self.errors() > 0
    }
}

/// Destination for comparison records.
///
/// The sink owns the durable copy of every record it accepts.
pub trait ResultSink: Send {
    fn record(&mut self, result: &ComparisonResult) -> Result<()>;

    fn record_iteration_failure(&mut self, failure: &IterationFailure) -> Result<()>;

    fn tally(&self) -> &Tally;

    /// Where records end up, for the final report
    fn location(&self) -> Option<&Path> {
        None
    }
}

/// One row of the comparison log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkRow {
    pub iteration: u64,
    pub timestamp: String,
    pub scenario_id: String,
    pub description: String,
    pub from_block: Option<u64>,
    pub to_block: Option<u64>,
    pub ref_log_count: String,
    pub test_log_count: String,
    pub ref_latency_ms: String,
    pub test_latency_ms: String,
    pub status: String,
}

impl SinkRow {
    pub fn from_result(result: &ComparisonResult) -> Self {
        Self {
            iteration: result.iteration,
            timestamp: result.timestamp.to_rfc3339(),
            scenario_id: result.scenario_id.clone(),
            description: result.description.clone(),
            from_block: Some(result.query.from_block()),
            to_block: Some(result.query.to_block()),
            ref_log_count: count_column(&result.reference),
            test_log_count: count_column(&result.candidate),
            ref_latency_ms: latency_column(&result.reference),
            test_latency_ms: latency_column(&result.candidate),
            status: result.status.as_str().to_string(),
        }
    }

    pub fn from_failure(failure: &IterationFailure) -> Self {
        Self {
            iteration: failure.iteration,
            timestamp: failure.timestamp.to_rfc3339(),
            scenario_id: ITERATION_FAILURE_ID.to_string(),
            description: failure.reason.clone(),
            from_block: None,
            to_block: None,
            ref_log_count: String::new(),
            test_log_count: String::new(),
            ref_latency_ms: String::new(),
            test_latency_ms: String::new(),
            status: Status::Error.as_str().to_string(),
        }
    }
}

fn count_column(response: &EndpointResponse) -> String {
    match response.log_count() {
        Some(count) => count.to_string(),
        None => FAILURE_MARKER.to_string(),
    }
}

fn latency_column(response: &EndpointResponse) -> String {
    if response.is_ok() {
        response.latency().as_millis().to_string()
    } else {
        FAILURE_MARKER.to_string()
    }
}

/// Append-only CSV log, one row per scenario per iteration
pub struct CsvSink {
    path: PathBuf,
    writer: csv::Writer<std::fs::File>,
    tally: Tally,
}

impl CsvSink {
    /// Open for appending; the header is written only into an empty file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let is_empty = file.metadata()?.len() == 0;
        let writer = WriterBuilder::new().has_headers(is_empty).from_writer(file);

        info!("Writing comparison results to {}", path.display());
        Ok(Self { path, writer, tally: Tally::default() })
    }

    fn write_row(&mut self, row: &SinkRow) -> Result<()> {
        self.writer.serialize(row)?;
        self.writer.flush()?;
        Ok(())
    }
}

impl ResultSink for CsvSink {
    fn record(&mut self, result: &ComparisonResult) -> Result<()> {
        self.write_row(&SinkRow::from_result(result))?;
        self.tally.add_result(result);
        Ok(())
    }

    fn record_iteration_failure(&mut self, failure: &IterationFailure) -> Result<()> {
        self.write_row(&SinkRow::from_failure(failure))?;
        self.tally.iteration_failures += 1;
        Ok(())
    }

    fn tally(&self) -> &Tally {
        &self.tally
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// In-memory sink, for library use and tests
#[derive(Debug, Default)]
pub struct MemorySink {
    pub results: Vec<ComparisonResult>,
    pub failures: Vec<IterationFailure>,
    tally: Tally,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultSink for MemorySink {
    fn record(&mut self, result: &ComparisonResult) -> Result<()> {
        self.tally.add_result(result);
        self.results.push(result.clone());
        Ok(())
    }

    fn record_iteration_failure(&mut self, failure: &IterationFailure) -> Result<()> {
        self.tally.iteration_failures += 1;
        self.failures.push(failure.clone());
        Ok(())
    }

    fn tally(&self) -> &Tally {
        &self.tally
    }
}
