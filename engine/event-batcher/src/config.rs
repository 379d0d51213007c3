//! Configuration for EventBatcher

use crate::error::{EngineError, EngineResult};
use crate::{DEFAULT_CONTROL_PREFIX, DEFAULT_EMISSION_PERIOD_MS, DEFAULT_SHUTDOWN_TIMEOUT_MS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the Engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Time between the end of one emission and the start of the next (default: 200ms)
    pub emission_period_ms: u64,

    /// Address patterns starting with this prefix are never overwritten while pending
    pub control_prefix: String,

    /// How long `stop` waits for a worker task before warning that it is still running.
    /// `stop` always waits for both tasks to finish.
    pub shutdown_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            emission_period_ms: DEFAULT_EMISSION_PERIOD_MS,
            control_prefix: DEFAULT_CONTROL_PREFIX.to_string(),
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
        }
    }
}

impl EngineConfig {
    /// Get emission period as Duration
    pub fn emission_period(&self) -> Duration {
        Duration::from_millis(self.emission_period_ms)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Reject values the Engine cannot run with
    pub fn validate(&self) -> EngineResult<()> {
        if self.emission_period_ms == 0 {
            return Err(EngineError::Config("emission_period_ms must be greater than zero".into()));
        }
        if !self.control_prefix.starts_with('/') {
            return Err(EngineError::Config(format!(
                "control_prefix must start with '/': {:?}",
                self.control_prefix
            )));
        }
        if self.shutdown_timeout_ms == 0 {
            return Err(EngineError::Config("shutdown_timeout_ms must be greater than zero".into()));
        }
        Ok(())
    }

    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.emission_period_ms, 200);
        assert_eq!(config.control_prefix, "/control");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_engine_config_duration_conversion() {
        let config = EngineConfig::default();
        assert_eq!(config.emission_period(), Duration::from_millis(200));
        assert_eq!(config.shutdown_timeout(), Duration::from_millis(5000));
    }

    #[test]
    fn test_engine_config_validation() {
        let config = EngineConfig { emission_period_ms: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));

        let config = EngineConfig { control_prefix: "control".into(), ..Default::default() };
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));

        let config = EngineConfig { shutdown_timeout_ms: 0, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: EngineConfig = toml::from_str("emission_period_ms = 50").unwrap();
        assert_eq!(config.emission_period_ms, 50);
        assert_eq!(config.control_prefix, "/control");
    }
}
