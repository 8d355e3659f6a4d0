//! Latency statistics per endpoint

use std::time::Duration;

use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::rpc::Side;
use crate::types::ComparisonResult;

/// Latencies above this are clamped; one hour is far beyond any request timeout
const MAX_TRACKED_LATENCY_MS: u64 = 3_600_000;

/// Latency distribution of successful requests against one endpoint
#[derive(Debug, Clone)]
pub struct LatencyStats {
    histogram: Histogram<u64>,
    total_ms: f64,
    failures: u64,
}

/// Serializable snapshot of [`LatencyStats`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub samples: u64,
    pub failures: u64,
    pub avg_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub max_ms: f64,
}

impl LatencyStats {
    pub fn new() -> Result<Self> {
        Ok(Self {
            histogram: Histogram::<u64>::new_with_bounds(1, MAX_TRACKED_LATENCY_MS, 3)?,
            total_ms: 0.0,
            failures: 0,
        })
    }

    pub fn record_success(&mut self, latency: Duration) {
        self.histogram.saturating_record(latency.as_millis() as u64);
        self.total_ms += latency.as_secs_f64() * 1000.0;
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    pub fn samples(&self) -> u64 {
        self.histogram.len()
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn avg_latency_ms(&self) -> f64 {
        if self.samples() == 0 {
            return 0.0;
        }
        self.total_ms / self.samples() as f64
    }

    pub fn p50_latency_ms(&self) -> f64 {
        self.histogram.value_at_percentile(50.0) as f64
    }

    pub fn p95_latency_ms(&self) -> f64 {
        self.histogram.value_at_percentile(95.0) as f64
    }

    pub fn p99_latency_ms(&self) -> f64 {
        self.histogram.value_at_percentile(99.0) as f64
    }

    pub fn max_latency_ms(&self) -> f64 {
        self.histogram.max() as f64
    }

    pub fn summary(&self) -> LatencySummary {
        LatencySummary {
            samples: self.samples(),
            failures: self.failures,
            avg_ms: self.avg_latency_ms(),
            p50_ms: self.p50_latency_ms(),
            p95_ms: self.p95_latency_ms(),
            p99_ms: self.p99_latency_ms(),
            max_ms: self.max_latency_ms(),
        }
    }
}

/// Latency stats for both sides of the campaign
#[derive(Debug, Clone)]
pub struct CampaignStatistics {
    pub reference: LatencyStats,
    pub candidate: LatencyStats,
}

impl CampaignStatistics {
    pub fn new() -> Result<Self> {
        Ok(Self {
            reference: LatencyStats::new()?,
            candidate: LatencyStats::new()?,
        })
    }

    pub fn side(&self, side: Side) -> &LatencyStats {
        match side {
            Side::Reference => &self.reference,
            Side::Candidate => &self.candidate,
        }
    }

    pub fn record(&mut self, result: &ComparisonResult) {
        for (stats, response) in [
            (&mut self.reference, &result.reference),
            (&mut self.candidate, &result.candidate),
        ] {
            if response.is_ok() {
                stats.record_success(response.latency());
            } else {
                stats.record_failure();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stats() {
        let stats = LatencyStats::new().unwrap();
        assert_eq!(stats.samples(), 0);
        assert_eq!(stats.avg_latency_ms(), 0.0);
        assert_eq!(stats.max_latency_ms(), 0.0);
    }

    #[test]
    fn test_latency_percentiles() {
        let mut stats = LatencyStats::new().unwrap();
        for ms in 1..=100 {
            stats.record_success(Duration::from_millis(ms));
        }
        stats.record_failure();

        assert_eq!(stats.samples(), 100);
        assert_eq!(stats.failures(), 1);
        assert!((stats.avg_latency_ms() - 50.5).abs() < 1e-9);
        assert_eq!(stats.p50_latency_ms(), 50.0);
        assert_eq!(stats.p99_latency_ms(), 99.0);
        assert_eq!(stats.max_latency_ms(), 100.0);
    }

    #[test]
    fn test_outlier_latency_is_clamped() {
        let mut stats = LatencyStats::new().unwrap();
        stats.record_success(Duration::from_secs(2 * 3600));
        assert_eq!(stats.samples(), 1);
        assert!(stats.max_latency_ms() >= 3_599_000.0);
    }
}
