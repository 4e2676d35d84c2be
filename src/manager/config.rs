//! Manager configuration

use crate::core::{Result, WorkError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default pause between ticks, in seconds
pub const DEFAULT_INTERRUPT_SECS: u64 = 5;

fn default_interrupt() -> Option<u64> {
    Some(DEFAULT_INTERRUPT_SECS)
}

fn default_thread_name_prefix() -> String {
    "work-house".to_string()
}

fn default_sleep_step_ms() -> u64 {
    1_000
}

/// Configuration for a [`Manager`](crate::Manager)
///
/// Omitted JSON fields take their defaults; an explicit `null` interrupt is
/// rejected by [`validate`](Self::validate).
///
/// ```rust
/// use work_house::ManagerConfig;
///
/// let config = ManagerConfig::from_json(r#"{ "interrupt_secs": 3, "processors": 2 }"#).unwrap();
/// assert_eq!(config.interrupt_secs, Some(3));
/// assert_eq!(config.thread_name_prefix, "work-house");
///
/// assert!(ManagerConfig::from_json(r#"{ "interrupt_secs": null }"#).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Seconds to pause between ticks
    #[serde(default = "default_interrupt")]
    pub interrupt_secs: Option<u64>,
    /// Processor count used for pool sizing; detected when `None`
    #[serde(default)]
    pub processors: Option<usize>,
    /// Pool thread name prefix
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
    /// Granularity of the interruptible pause, in milliseconds
    #[serde(default = "default_sleep_step_ms")]
    pub sleep_step_ms: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            interrupt_secs: default_interrupt(),
            processors: None,
            thread_name_prefix: default_thread_name_prefix(),
            sleep_step_ms: default_sleep_step_ms(),
        }
    }
}

impl ManagerConfig {
    /// Create a configuration with the default interrupt
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| WorkError::invalid_argument("config", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the pause between ticks
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_interrupt(mut self, secs: u64) -> Self {
        self.interrupt_secs = Some(secs);
        self
    }

    /// Override the detected processor count
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_processors(mut self, processors: usize) -> Self {
        self.processors = Some(processors);
        self
    }

    /// Set pool thread name prefix
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set how often the pause re-checks the stop flag
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_sleep_step(mut self, step: Duration) -> Self {
        self.sleep_step_ms = step.as_millis() as u64;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        match self.interrupt_secs {
            None => {
                return Err(WorkError::invalid_argument(
                    "interrupt",
                    "Undefined argument: 'interrupt'",
                ))
            }
            Some(0) => {
                return Err(WorkError::invalid_argument(
                    "interrupt",
                    "interrupt must be a positive number of seconds",
                ))
            }
            Some(_) => {}
        }
        if self.processors == Some(0) {
            return Err(WorkError::invalid_argument(
                "processors",
                "processor count must be greater than 0",
            ));
        }
        if self.sleep_step_ms == 0 {
            return Err(WorkError::invalid_argument(
                "sleep_step_ms",
                "sleep step must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Pause between ticks
    pub fn interrupt(&self) -> Duration {
        Duration::from_secs(self.interrupt_secs.unwrap_or(DEFAULT_INTERRUPT_SECS))
    }

    /// Granularity of the pause
    pub fn sleep_step(&self) -> Duration {
        Duration::from_millis(self.sleep_step_ms)
    }

    /// Processor count to size the pool with
    pub fn processors(&self) -> usize {
        self.processors
            .unwrap_or_else(crate::system_info::processor_count)
    }
}
