//! Engine configuration
//!
//! Layered the usual way: built-in defaults, then an optional file, then
//! `APPROVAL__*` environment variables.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Main engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub workflow: WorkflowConfig,

    #[serde(default)]
    pub review: ReviewConfig,

    #[serde(default)]
    pub poller: PollerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Days after completion during which a DONE document may be reopened
    #[serde(default = "default_reopen_window_days")]
    pub reopen_window_days: i64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            reopen_window_days: default_reopen_window_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Seniority at or above which an identity may answer a review raised
    /// on the top authority's own chain position
    #[serde(default = "default_qualifying_seniority")]
    pub qualifying_seniority: u8,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            qualifying_seniority: default_qualifying_seniority(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Interval between notification refreshes
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_reopen_window_days() -> i64 {
    30
}

fn default_qualifying_seniority() -> u8 {
    3
}

fn default_poll_interval() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl EngineConfig {
    /// Load configuration from an optional file and the environment
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&EngineConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("APPROVAL")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        let days = self.workflow.reopen_window_days;
        if days < 0 {
            return Err(config::ConfigError::Message(format!(
                "workflow.reopen_window_days must not be negative (got {})",
                days
            )));
        }
        if Duration::try_days(days).is_none() {
            return Err(config::ConfigError::Message(format!(
                "workflow.reopen_window_days is out of range (got {})",
                days
            )));
        }
        Ok(())
    }

    /// The rule parameters the workflow engine runs with.
    ///
    /// Out-of-range windows saturate; [`Self::validate`] reports them.
    pub fn policy(&self) -> WorkflowPolicy {
        let days = self.workflow.reopen_window_days.max(0);
        WorkflowPolicy {
            reopen_window: Duration::try_days(days).unwrap_or(Duration::MAX),
            qualifying_seniority: self.review.qualifying_seniority,
        }
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poller.interval_secs.max(1))
    }
}

/// Rule parameters shared by every engine component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowPolicy {
    pub reopen_window: Duration,
    pub qualifying_seniority: u8,
}

impl Default for WorkflowPolicy {
    fn default() -> Self {
        EngineConfig::default().policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.workflow.reopen_window_days, 30);
        assert_eq!(config.poller.interval_secs, 60);
        assert_eq!(config.review.qualifying_seniority, 3);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_policy_from_config() {
        let policy = EngineConfig::default().policy();
        assert_eq!(policy.reopen_window, Duration::days(30));
        assert_eq!(policy, WorkflowPolicy::default());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "workflow": { "reopen_window_days": 14 } }"#).unwrap();
        assert_eq!(config.workflow.reopen_window_days, 14);
        assert_eq!(config.poller.interval_secs, 60);
    }

    #[test]
    fn test_load_without_file() {
        let config = EngineConfig::load(None).unwrap();
        assert!(config.workflow.reopen_window_days > 0);
    }

    #[test]
    fn test_poll_interval_never_zero() {
        let mut config = EngineConfig::default();
        config.poller.interval_secs = 0;
        assert_eq!(config.poll_interval(), std::time::Duration::from_secs(1));
    }

    #[test]
    fn test_reopen_window_must_be_in_range() {
        let mut config = EngineConfig::default();
        assert!(config.validate().is_ok());

        config.workflow.reopen_window_days = -1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must not be negative"));
        assert_eq!(config.policy().reopen_window, Duration::zero());

        config.workflow.reopen_window_days = i64::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("out of range"));
        assert_eq!(config.policy().reopen_window, Duration::MAX);
    }

    #[test]
    fn test_load_rejects_out_of_range_window() {
        let path = std::env::temp_dir().join(format!("approval-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "workflow": { "reopen_window_days": 9223372036854775807 } }"#)
            .unwrap();
        let result = EngineConfig::load(path.to_str());
        std::fs::remove_file(&path).ok();
        assert!(result.is_err());
    }
}
