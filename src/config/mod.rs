//! Configuration loading and parsing.
//!
//! This module provides YAML-based configuration for the trace relay and
//! the mapping engine, plus loading of mapping rule files.

mod error;
mod types;
mod yaml;

pub use error::ConfigError;
pub use types::{
    DEFAULT_TRACE_TTL_SECS, MappingConfig, RelayConfig, TelemetryConfig, TraceStoreConfig,
};
pub use yaml::YamlLoader;
