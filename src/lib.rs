//! petit-relay - trace continuity and declarative data mapping for
//! suspendable workflow tasks.
//!
//! Two subsystems live here:
//!
//! - [`trace`]: saves span identifiers when a task suspends and restarts a
//!   span continuing the same trace when it resumes.
//! - [`mapping`]: applies ordered mapping rules that move values between a
//!   workflow's `context`, a task's `input` and its `output`.

pub mod config;
pub mod core;
pub mod mapping;
pub mod storage;
pub mod testing;
pub mod trace;

pub use config::{
    ConfigError, MappingConfig, RelayConfig, TelemetryConfig, TraceStoreConfig, YamlLoader,
};
pub use core::types::{ExecutionId, TaskId};
pub use mapping::{
    EvaluationError, ExpressionEvaluator, JsonPath, MappingEngine, MappingError, MappingRule,
    PathAccessor, PathError, SourceResolver, TransformEvaluator, UnsupportedEvaluator,
};
pub use storage::{InMemoryKeyValueStore, KeyValueStore, StorageError};
pub use trace::{
    ResumedContext, SpanContext, SpanRelay, SpanStart, TraceContextStore, TraceError, TraceFlags,
    TraceSpan, Tracer,
};
