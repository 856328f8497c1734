use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::{
    DEFAULT_DEGRADED_FETCH_INTERVAL_MS, DEFAULT_DEGRADE_AFTER_FAILURES,
    DEFAULT_MIN_FETCH_INTERVAL_MS, DEFAULT_PROBE_INTERVAL_MS,
};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid polling config: {0}")]
    Validation(String),

    #[error("failed to parse polling config: {0}")]
    Parse(String),
}

/// Timing knobs for the conversation poller. Every field has a default so a
/// shell can send a partial JSON object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub probe_interval_ms: u64,
    pub min_fetch_interval_ms: u64,
    pub degraded_fetch_interval_ms: u64,
    pub degrade_after_failures: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            probe_interval_ms: DEFAULT_PROBE_INTERVAL_MS,
            min_fetch_interval_ms: DEFAULT_MIN_FETCH_INTERVAL_MS,
            degraded_fetch_interval_ms: DEFAULT_DEGRADED_FETCH_INTERVAL_MS,
            degrade_after_failures: DEFAULT_DEGRADE_AFTER_FAILURES,
        }
    }
}

impl PollingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.probe_interval_ms == 0 {
            return Err(ConfigError::Validation("probe_interval_ms must be > 0".into()));
        }
        if self.min_fetch_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "min_fetch_interval_ms must be > 0".into(),
            ));
        }
        if self.degrade_after_failures == 0 {
            return Err(ConfigError::Validation(
                "degrade_after_failures must be > 0".into(),
            ));
        }
        if self.degraded_fetch_interval_ms < self.min_fetch_interval_ms {
            return Err(ConfigError::Validation(format!(
                "degraded_fetch_interval_ms ({}) must not be shorter than min_fetch_interval_ms ({})",
                self.degraded_fetch_interval_ms, self.min_fetch_interval_ms
            )));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub const fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    #[must_use]
    pub const fn min_fetch_interval(&self) -> Duration {
        Duration::from_millis(self.min_fetch_interval_ms)
    }

    #[must_use]
    pub const fn degraded_fetch_interval(&self) -> Duration {
        Duration::from_millis(self.degraded_fetch_interval_ms)
    }
}
