//! Configuration type definitions.
//!
//! Every section is optional in YAML; missing fields fall back to the
//! defaults below.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default lifetime of stored trace records (two hours).
pub const DEFAULT_TRACE_TTL_SECS: u64 = 2 * 60 * 60;

/// Top-level relay configuration (relay.yaml).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Trace record persistence.
    pub trace: TraceStoreConfig,
    /// Mapping engine settings.
    pub mapping: MappingConfig,
    /// Tracer identity and exporter settings.
    pub telemetry: TelemetryConfig,
}

/// Trace record persistence settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceStoreConfig {
    /// Key prefix of task-scoped records.
    pub task_key_prefix: String,
    /// Key prefix of execution-scoped records.
    pub execution_key_prefix: String,
    /// Record lifetime in seconds.
    pub ttl_secs: u64,
}

impl TraceStoreConfig {
    /// Record lifetime as a duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Override the record lifetime.
    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }
}

impl Default for TraceStoreConfig {
    fn default() -> Self {
        Self {
            task_key_prefix: "petit_trace_".to_string(),
            execution_key_prefix: "petit_trace_execution_".to_string(),
            ttl_secs: DEFAULT_TRACE_TTL_SECS,
        }
    }
}

/// Mapping engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Scheme and host of the orchestrator, e.g. `http://petit:8080`.
    pub server_host: String,
    /// Path of the task callback endpoint.
    pub trigger_uri: String,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            server_host: "http://localhost:8080".to_string(),
            trigger_uri: "/flow/trigger_function.json".to_string(),
        }
    }
}

/// Tracer identity and exporter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// `service.name` attribute on the instrumentation scope.
    pub service_name: String,
    /// Instrumentation scope name.
    pub tracer_name: String,
    /// Instrumentation scope version.
    pub tracer_version: String,
    /// OTLP collector endpoint.
    pub endpoint: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "petit-relay".to_string(),
            tracer_name: "petit-relay".to_string(),
            tracer_version: env!("CARGO_PKG_VERSION").to_string(),
            endpoint: "http://localhost:4317".to_string(),
        }
    }
}
