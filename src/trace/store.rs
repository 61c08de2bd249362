//! Persistence of span snapshots in a TTL-bounded key-value store.

use std::sync::Arc;
use tracing::{debug, error, warn};

use super::{ExecutionRecord, SpanContext, SpanRecord, TraceError};
use crate::config::TraceStoreConfig;
use crate::core::types::{ExecutionId, TaskId};
use crate::storage::KeyValueStore;

/// Saves and removes span snapshots keyed by execution and task.
///
/// Writes are best-effort: every failure is logged and swallowed so that
/// a broken store never interrupts the task being traced.
#[derive(Clone)]
pub struct TraceContextStore {
    store: Arc<dyn KeyValueStore>,
    config: TraceStoreConfig,
}

impl TraceContextStore {
    /// Create a trace store over the given key-value backend.
    pub fn new(store: Arc<dyn KeyValueStore>, config: TraceStoreConfig) -> Self {
        Self { store, config }
    }

    /// Persistence settings.
    pub fn config(&self) -> &TraceStoreConfig {
        &self.config
    }

    /// Key of the task-scoped record.
    pub fn task_key(&self, execution_id: &ExecutionId, task_id: &TaskId) -> String {
        format!("{}{}_{}", self.config.task_key_prefix, execution_id, task_id)
    }

    /// Key of the execution-scoped record.
    pub fn execution_key(&self, execution_id: &ExecutionId) -> String {
        format!("{}{}", self.config.execution_key_prefix, execution_id)
    }

    /// Snapshot `current` (and its parent's span id) for a suspending task.
    pub async fn save_context(
        &self,
        execution_id: &ExecutionId,
        task_id: &TaskId,
        parent: Option<&SpanContext>,
        current: &SpanContext,
    ) {
        let key = self.task_key(execution_id, task_id);
        let record = SpanRecord::capture(parent, current);
        match self.write(&key, &record).await {
            Ok(()) => debug!(
                execution_id = %execution_id,
                task_id = %task_id,
                span_id = %current.span_id,
                "saved span context"
            ),
            Err(e) => error!(
                execution_id = %execution_id,
                task_id = %task_id,
                error = %e,
                "failed to save span context"
            ),
        }
    }

    /// Snapshot the root span of an execution.
    pub async fn save_execution_context(&self, execution_id: &ExecutionId, span: &SpanContext) {
        let key = self.execution_key(execution_id);
        let record = ExecutionRecord::capture(span);
        match self.write(&key, &record).await {
            Ok(()) => debug!(
                execution_id = %execution_id,
                span_id = %span.span_id,
                "saved execution span context"
            ),
            Err(e) => error!(
                execution_id = %execution_id,
                error = %e,
                "failed to save execution span context"
            ),
        }
    }

    /// Delete the task-scoped record, if any.
    pub async fn remove_span_context(&self, execution_id: &ExecutionId, task_id: &TaskId) {
        let key = self.task_key(execution_id, task_id);
        if let Err(e) = self.store.del(&key).await {
            warn!(
                execution_id = %execution_id,
                task_id = %task_id,
                error = %e,
                "failed to remove span context"
            );
        }
    }

    /// Read and consume the task-scoped record.
    pub async fn take_span_record(
        &self,
        execution_id: &ExecutionId,
        task_id: &TaskId,
    ) -> Result<Option<SpanRecord>, TraceError> {
        let raw = self.store.take(&self.task_key(execution_id, task_id)).await?;
        decode(raw)
    }

    /// Read the execution-scoped record without consuming it.
    pub async fn read_execution_record(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<Option<ExecutionRecord>, TraceError> {
        let raw = self.store.get(&self.execution_key(execution_id)).await?;
        decode(raw)
    }

    async fn write<R: serde::Serialize>(&self, key: &str, record: &R) -> Result<(), TraceError> {
        let json = serde_json::to_string(record)?;
        self.store.set(key, json).await?;
        match self.store.expire(key, self.config.ttl()).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                warn!(key, "record vanished before its ttl was set");
                Ok(())
            }
            Err(e) => {
                // never leave a record behind without a ttl
                if let Err(del) = self.store.del(key).await {
                    warn!(key, error = %del, "failed to drop record without ttl");
                }
                Err(e.into())
            }
        }
    }
}

fn decode<R: serde::de::DeserializeOwned>(raw: Option<String>) -> Result<Option<R>, TraceError> {
    match raw {
        Some(json) if !json.trim().is_empty() => Ok(Some(serde_json::from_str(&json)?)),
        _ => Ok(None),
    }
}
