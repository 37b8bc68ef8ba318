//! Queue configuration shared by Lingua clients.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sync::RetryPolicy;

const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// Tuning for the offline result queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueConfig {
    /// Uploads in flight at once during a flush pass
    pub max_concurrency: usize,
    pub retry: RetryPolicy,
    /// Offset used to turn result timestamps into practice dates
    pub utc_offset_minutes: i32,
    /// How often the connectivity watcher re-checks reachability
    pub probe_interval_secs: u64,
    /// Commands buffered for the queue task
    pub channel_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            retry: RetryPolicy::default(),
            utc_offset_minutes: 0,
            probe_interval_secs: 30,
            channel_capacity: 64,
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(Error::Config("max_concurrency must be at least 1".into()));
        }
        if self.channel_capacity == 0 {
            return Err(Error::Config("channel_capacity must be at least 1".into()));
        }
        if self.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(Error::Config(format!(
                "utc_offset_minutes must be within ±{MAX_UTC_OFFSET_MINUTES}"
            )));
        }
        if self.probe_interval_secs == 0 {
            return Err(Error::Config("probe_interval_secs must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.retry.max_delay_secs < self.retry.base_delay_secs {
            return Err(Error::Config(
                "retry.max_delay_secs must not be below retry.base_delay_secs".into(),
            ));
        }
        Ok(())
    }

    pub const fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<QueueConfig> {
        let config: QueueConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn defaults_are_valid() {
        QueueConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config = parse(r#"{"max_concurrency": 2, "retry": {"max_attempts": 3}}"#).unwrap();
        assert_eq!(config.max_concurrency, 2);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_secs, 30);
        assert_eq!(config.probe_interval(), Duration::from_secs(30));
    }

    #[test]
    fn rejects_unknown_fields() {
        let error = parse(r#"{"max_concurency": 2}"#).unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(parse(r#"{"max_concurrency": 0}"#).is_err());
        assert!(parse(r#"{"utc_offset_minutes": 900}"#).is_err());
        assert!(parse(r#"{"retry": {"base_delay_secs": 60, "max_delay_secs": 10}}"#).is_err());
    }
}
