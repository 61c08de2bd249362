//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use petit_relay::mapping::ExpressionEvaluator;
use petit_relay::testing::{ArithmeticEvaluator, RecordingTracer};
use petit_relay::{
    InMemoryKeyValueStore, KeyValueStore, MappingConfig, MappingEngine, SpanRelay,
    TraceContextStore, TraceStoreConfig,
};
use serde_json::{Map, Value};
use std::sync::Arc;

/// A relay over a fresh in-memory store, returning the store for inspection.
pub fn relay_with(config: TraceStoreConfig) -> (Arc<InMemoryKeyValueStore>, SpanRelay<RecordingTracer>) {
    let kv = Arc::new(InMemoryKeyValueStore::new());
    let store = TraceContextStore::new(kv.clone(), config);
    (kv, SpanRelay::new(store, RecordingTracer::new()))
}

/// A relay over an arbitrary store.
pub fn relay_over(kv: Arc<dyn KeyValueStore>) -> SpanRelay<RecordingTracer> {
    let store = TraceContextStore::new(kv, TraceStoreConfig::default());
    SpanRelay::new(store, RecordingTracer::new())
}

/// A mapping engine with the arithmetic test evaluator.
pub fn engine() -> MappingEngine {
    engine_with(Arc::new(ArithmeticEvaluator))
}

/// A mapping engine with the given evaluator and default settings.
pub fn engine_with(evaluator: Arc<dyn ExpressionEvaluator>) -> MappingEngine {
    MappingEngine::new(MappingConfig::default(), evaluator)
}

/// Unwrap a JSON object literal into a map.
///
/// # Panics
///
/// Panics if `value` is not an object.
pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

/// The three documents of a mapping call.
pub struct Documents {
    pub context: Map<String, Value>,
    pub input: Map<String, Value>,
    pub output: Map<String, Value>,
}

impl Documents {
    pub fn new(context: Value, input: Value, output: Value) -> Self {
        Self {
            context: object(context),
            input: object(input),
            output: object(output),
        }
    }

    pub fn empty() -> Self {
        Self {
            context: Map::new(),
            input: Map::new(),
            output: Map::new(),
        }
    }
}
