//! Director configuration (stagehand.toml)

use serde::{Deserialize, Serialize};
use stagehand_animation::interpolation::{
    InterpolationConfig, DEFAULT_BATCH_THRESHOLD, DEFAULT_THROTTLED_INTERVAL,
};
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, TimelineError};
use crate::scheduler::{SchedulerConfig, DEFAULT_MAX_TOUCH_LISTENERS, DEFAULT_TOUCH_SETTLE_DELAY};

/// Runtime tuning for a [`Director`](crate::Director)
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct DirectorConfig {
    /// Simulation frames per second for [`run_for`](crate::Director::run_for)
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f64,
    /// Changed objects at which pose writes are batched
    #[serde(default = "default_batch_threshold")]
    pub batch_threshold: usize,
    /// Wall-clock budget of one interpolation tick
    #[serde(default = "default_frame_budget_ms")]
    pub frame_budget_ms: u64,
    /// Seconds between interpolation ticks while throttled
    #[serde(default = "default_throttled_interval")]
    pub throttled_interval: f64,
    /// Seconds before a multiple-touch participant can re-trigger
    #[serde(default = "default_touch_settle_delay")]
    pub touch_settle_delay: f64,
    #[serde(default = "default_max_touch_listeners")]
    pub max_touch_listeners: usize,
}

fn default_frame_rate() -> f64 {
    60.0
}

fn default_batch_threshold() -> usize {
    DEFAULT_BATCH_THRESHOLD
}

fn default_frame_budget_ms() -> u64 {
    33
}

fn default_throttled_interval() -> f64 {
    DEFAULT_THROTTLED_INTERVAL
}

fn default_touch_settle_delay() -> f64 {
    DEFAULT_TOUCH_SETTLE_DELAY
}

fn default_max_touch_listeners() -> usize {
    DEFAULT_MAX_TOUCH_LISTENERS
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            frame_rate: default_frame_rate(),
            batch_threshold: default_batch_threshold(),
            frame_budget_ms: default_frame_budget_ms(),
            throttled_interval: default_throttled_interval(),
            touch_settle_delay: default_touch_settle_delay(),
            max_touch_listeners: default_max_touch_listeners(),
        }
    }
}

impl DirectorConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: DirectorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |parameter, reason: &str| {
            Err(TimelineError::InvalidParameter {
                parameter,
                reason: reason.to_string(),
            })
        };
        if !(self.frame_rate.is_finite() && self.frame_rate > 0.0) {
            return invalid("frame_rate", "must be a positive number");
        }
        if self.batch_threshold == 0 {
            return invalid("batch_threshold", "must be at least 1");
        }
        if !(self.throttled_interval.is_finite() && self.throttled_interval > 0.0) {
            return invalid("throttled_interval", "must be a positive number");
        }
        if !(self.touch_settle_delay.is_finite() && self.touch_settle_delay >= 0.0) {
            return invalid("touch_settle_delay", "must not be negative");
        }
        Ok(())
    }

    /// Seconds per simulation frame
    pub fn frame_interval(&self) -> f64 {
        1.0 / self.frame_rate
    }

    pub fn interpolation(&self) -> InterpolationConfig {
        InterpolationConfig {
            batch_threshold: self.batch_threshold,
            frame_budget: Duration::from_millis(self.frame_budget_ms),
            throttled_interval: self.throttled_interval,
        }
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            touch_settle_delay: self.touch_settle_delay,
            max_touch_listeners: self.max_touch_listeners,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config = DirectorConfig::from_toml_str("").unwrap();
        assert_eq!(config, DirectorConfig::default());
        assert_eq!(config.batch_threshold, 5);
        assert_eq!(config.interpolation().frame_budget, Duration::from_millis(33));
        assert_eq!(config.scheduler().max_touch_listeners, 64);
    }

    #[test]
    fn test_partial_override() {
        let config = DirectorConfig::from_toml_str("frame_rate = 30.0\ntouch_settle_delay = 2.5").unwrap();
        assert_eq!(config.frame_rate, 30.0);
        assert_eq!(config.touch_settle_delay, 2.5);
        assert_eq!(config.throttled_interval, 0.1);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            DirectorConfig::from_toml_str("frame_rate = 0.0"),
            Err(TimelineError::InvalidParameter {
                parameter: "frame_rate",
                ..
            })
        ));
        assert!(matches!(
            DirectorConfig::from_toml_str("batch_threshold = \"many\""),
            Err(TimelineError::Toml(_))
        ));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = DirectorConfig::load(Path::new("/nonexistent/stagehand.toml")).unwrap();
        assert_eq!(config, DirectorConfig::default());
    }
}
