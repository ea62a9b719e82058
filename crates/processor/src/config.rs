//! Configuration types for the statistics engine
//!
//! This module provides configuration for the coordinator's event
//! channel and the timer-registration retry policy.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ProcessorError, Result};

/// Main engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Timer registration retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Capacity of the coordinator's event channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl EngineConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.retry.validate()?;
        if self.event_buffer == 0 {
            return Err(ProcessorError::Unexpected(
                "event_buffer must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Retry policy for timer registration
///
/// Registration may fail transiently while dependent services are still
/// starting. The scheduler retries until it succeeds; the attempt count
/// is unbounded but the delay between attempts grows exponentially and
/// is capped at `max_delay_ms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay before the first retry, in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound on the delay between retries, in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Multiplier applied to the delay after each failed attempt
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl RetryConfig {
    /// Validate the policy
    pub fn validate(&self) -> Result<()> {
        if self.initial_delay_ms == 0 {
            return Err(ProcessorError::Unexpected(
                "retry initial_delay_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(ProcessorError::Unexpected(
                "retry max_delay_ms must not be below initial_delay_ms".to_string(),
            ));
        }
        if self.multiplier < 1.0 {
            return Err(ProcessorError::Unexpected(
                "retry multiplier must be at least 1.0".to_string(),
            ));
        }
        Ok(())
    }

    /// The infinite sequence of backoff delays this policy produces
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let initial = self.initial_delay_ms as f64;
        let max = self.max_delay_ms as f64;
        let multiplier = self.multiplier;
        (0u32..).map(move |attempt| {
            let ms = (initial * multiplier.powi(attempt as i32)).min(max);
            Duration::from_millis(ms as u64)
        })
    }
}

fn default_event_buffer() -> usize {
    1024
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_multiplier() -> f64 {
    2.0
}
