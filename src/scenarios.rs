//! Scenario battery: built-in defaults and JSON scenario files

use std::collections::HashSet;
use std::path::Path;

use alloy_primitives::{b256, B256};

use crate::error::{ComparatorError, Result};
use crate::query::{ScenarioTemplate, TopicFilter};

/// `Transfer(address,address,uint256)`
pub fn transfer_topic() -> B256 {
    b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef")
}

/// Windows on both sides of the default 1000-block range-mode threshold
pub fn default_battery() -> Vec<ScenarioTemplate> {
    let transfer = || vec![Some(TopicFilter::Single(transfer_topic()))];
    vec![
        ScenarioTemplate::new("head_block", "Latest block only", 0, 0),
        ScenarioTemplate::new("last_10", "Latest 10 blocks", 9, 0),
        ScenarioTemplate::new("last_100", "Latest 100 blocks", 99, 0),
        ScenarioTemplate::new("last_100_transfers", "ERC-20 Transfer logs in latest 100 blocks", 99, 0)
            .with_topics(transfer()),
        ScenarioTemplate::new("last_1000_lagged", "1000 blocks ending 10 behind head", 1009, 10),
        ScenarioTemplate::new("last_2000", "Latest 2000 blocks", 1999, 0),
        ScenarioTemplate::new("last_5000_transfers", "ERC-20 Transfer logs in latest 5000 blocks", 4999, 0)
            .with_topics(transfer()),
    ]
}

/// Non-empty, unique ids, every template valid
pub fn validate_battery(battery: &[ScenarioTemplate]) -> Result<()> {
    if battery.is_empty() {
        return Err(ComparatorError::Configuration("scenario battery is empty".to_string()));
    }

    let mut seen = HashSet::new();
    for template in battery {
        template.validate()?;
        if !seen.insert(template.id.as_str()) {
            return Err(ComparatorError::InvalidScenario {
                id: template.id.clone(),
                reason: "duplicate scenario id".to_string(),
            });
        }
    }
    Ok(())
}

/// Load a JSON array of scenario templates
pub fn load_battery(path: &Path) -> Result<Vec<ScenarioTemplate>> {
    let content = std::fs::read_to_string(path)?;
    let battery: Vec<ScenarioTemplate> = serde_json::from_str(&content)?;
    validate_battery(&battery)?;
    Ok(battery)
}
