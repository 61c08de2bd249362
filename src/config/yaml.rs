//! YAML configuration parsing.
//!
//! Parses the relay configuration and mapping rule files.

use std::path::Path;

use super::error::ConfigError;
use super::types::RelayConfig;
use crate::mapping::MappingRule;

/// YAML configuration loader.
pub struct YamlLoader;

impl YamlLoader {
    /// Load relay configuration from a file.
    pub fn load_relay_config(path: impl AsRef<Path>) -> Result<RelayConfig, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_relay_config(&content)
    }

    /// Parse relay configuration from a YAML string.
    pub fn parse_relay_config(yaml: &str) -> Result<RelayConfig, ConfigError> {
        let config: RelayConfig = serde_yaml::from_str(yaml)?;
        Self::validate_relay_config(&config)?;
        Ok(config)
    }

    /// Load a mapping rule list from a file.
    pub fn load_rules(path: impl AsRef<Path>) -> Result<Vec<MappingRule>, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_rules(&content)
    }

    /// Parse a mapping rule list from a YAML string.
    pub fn parse_rules(yaml: &str) -> Result<Vec<MappingRule>, ConfigError> {
        let rules: Vec<MappingRule> = serde_yaml::from_str(yaml)?;
        Ok(rules)
    }

    /// Validate relay configuration.
    fn validate_relay_config(config: &RelayConfig) -> Result<(), ConfigError> {
        let trace = &config.trace;
        if trace.task_key_prefix.is_empty() {
            return Err(ConfigError::MissingField("trace.task_key_prefix".into()));
        }
        if trace.execution_key_prefix.is_empty() {
            return Err(ConfigError::MissingField("trace.execution_key_prefix".into()));
        }
        // execution keys must never collide with "<exec>_<task>" task keys
        if trace.task_key_prefix == trace.execution_key_prefix {
            return Err(ConfigError::InvalidConfig(
                "trace.task_key_prefix and trace.execution_key_prefix must differ".into(),
            ));
        }
        if trace.ttl_secs == 0 {
            return Err(ConfigError::InvalidConfig("trace.ttl_secs cannot be zero".into()));
        }
        if config.mapping.server_host.trim().is_empty() {
            return Err(ConfigError::MissingField("mapping.server_host".into()));
        }
        Ok(())
    }
}
