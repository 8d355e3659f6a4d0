//! Campaign configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::RunArgs;
use crate::error::{ComparatorError, Result};
use crate::query::{ProcessingMode, ScenarioTemplate};
use crate::scenarios;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignConfig {
    pub reference_url: String,
    pub candidate_url: String,
    pub output: PathBuf,
    /// 0 = unbounded
    pub iterations: u64,
    #[serde(with = "human_duration")]
    pub delay: Duration,
    pub stop_on_error: bool,
    pub concurrency: usize,
    #[serde(with = "human_duration")]
    pub request_timeout: Duration,
    pub range_threshold: u64,
    #[serde(default = "scenarios::default_battery")]
    pub scenarios: Vec<ScenarioTemplate>,
    #[serde(default)]
    pub summary_json: Option<PathBuf>,
}

impl CampaignConfig {
    pub fn from_cli(args: &RunArgs) -> Result<Self> {
        if let Some(path) = &args.config {
            return Self::from_file(path);
        }

        let scenarios = match &args.scenarios {
            Some(path) => scenarios::load_battery(path)?,
            None => scenarios::default_battery(),
        };

        let config = Self {
            reference_url: args.reference_url.clone(),
            candidate_url: args.candidate_url.clone(),
            output: args.output.clone(),
            iterations: args.iterations,
            delay: args.delay,
            stop_on_error: args.stop_on_error,
            concurrency: args.concurrency,
            request_timeout: args.request_timeout,
            range_threshold: args.range_threshold,
            scenarios,
            summary_json: args.summary_json.clone(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.reference_url.trim().is_empty() || self.candidate_url.trim().is_empty() {
            return Err(ComparatorError::Configuration(
                "both reference and candidate URLs are required".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(ComparatorError::Configuration("concurrency must be at least 1".to_string()));
        }
        if self.request_timeout.is_zero() {
            return Err(ComparatorError::Configuration("request timeout must be non-zero".to_string()));
        }
        scenarios::validate_battery(&self.scenarios)
    }

    pub fn is_bounded(&self) -> bool {
        self.iterations > 0
    }

    pub fn mode_of(&self, template: &ScenarioTemplate) -> ProcessingMode {
        ProcessingMode::classify(template.span(), self.range_threshold)
    }
}

/// `Duration` as a humantime string (`"30s"`, `"5m"`)
mod human_duration {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(de::Error::custom)
    }
}
