//! Reconstruction of suspended spans.

use std::time::SystemTime;
use tracing::{debug, error};

use super::{
    EXECUTION_ID_ATTRIBUTE, ExecutionRecord, ORIGINAL_SPAN_ID_ATTRIBUTE, SpanContext, SpanRecord,
    SpanStart, TASK_ID_ATTRIBUTE, TraceContextStore, TraceError, TraceSpan, Tracer,
};
use crate::core::types::{ExecutionId, TaskId};

/// Name of spans started for a resumed task.
pub const TASK_SPAN_NAME: &str = "task_resumed";
/// Name of spans started for a resumed execution.
pub const EXECUTION_SPAN_NAME: &str = "execution_resumed";

/// A span restarted from a stored snapshot.
#[derive(Debug)]
pub struct ResumedContext<S> {
    /// The newly started span.
    pub span: S,
    /// Parent the span was started under.
    pub parent: SpanContext,
    /// Id of the span that was suspended.
    pub original_span_id: String,
    /// Start time carried over from the snapshot.
    pub start_time: SystemTime,
}

impl<S: TraceSpan> ResumedContext<S> {
    /// Identity of the new span.
    pub fn span_context(&self) -> SpanContext {
        self.span.span_context()
    }
}

/// Restarts spans for tasks and executions resuming after suspension.
pub struct SpanRelay<T: Tracer> {
    store: TraceContextStore,
    tracer: T,
}

impl<T: Tracer> SpanRelay<T> {
    /// Create a relay reading from `store` and starting spans on `tracer`.
    pub fn new(store: TraceContextStore, tracer: T) -> Self {
        Self { store, tracer }
    }

    /// Underlying record store, for saving snapshots.
    pub fn store(&self) -> &TraceContextStore {
        &self.store
    }

    /// Tracer spans are started on.
    pub fn tracer(&self) -> &T {
        &self.tracer
    }

    /// Resume the span of a suspended task.
    ///
    /// Consumes the stored record. Returns `None` when nothing was saved,
    /// the record expired, or it could not be decoded.
    pub async fn load_span(&self, execution_id: &ExecutionId, task_id: &TaskId) -> Option<T::Span> {
        self.load_context(execution_id, task_id)
            .await
            .map(|resumed| resumed.span)
    }

    /// Like [`load_span`](Self::load_span), also returning the linkage the
    /// span was started with.
    pub async fn load_context(
        &self,
        execution_id: &ExecutionId,
        task_id: &TaskId,
    ) -> Option<ResumedContext<T::Span>> {
        let result = self.resume_task(execution_id, task_id).await;
        self.store.remove_span_context(execution_id, task_id).await;

        match result {
            Ok(Some(resumed)) => {
                debug!(
                    execution_id = %execution_id,
                    task_id = %task_id,
                    original_span_id = %resumed.original_span_id,
                    "resumed task span"
                );
                Some(resumed)
            }
            Ok(None) => {
                debug!(execution_id = %execution_id, task_id = %task_id, "no span context stored");
                None
            }
            Err(e) => {
                error!(
                    execution_id = %execution_id,
                    task_id = %task_id,
                    error = %e,
                    "failed to load span context"
                );
                None
            }
        }
    }

    /// Resume the root span of an execution. The record is left in place.
    pub async fn load_execution_context(
        &self,
        execution_id: &ExecutionId,
    ) -> Option<ResumedContext<T::Span>> {
        match self.resume_execution(execution_id).await {
            Ok(resumed) => resumed,
            Err(e) => {
                error!(
                    execution_id = %execution_id,
                    error = %e,
                    "failed to load execution span context"
                );
                None
            }
        }
    }

    /// Delete the task-scoped record.
    pub async fn remove_span_context(&self, execution_id: &ExecutionId, task_id: &TaskId) {
        self.store.remove_span_context(execution_id, task_id).await;
    }

    async fn resume_task(
        &self,
        execution_id: &ExecutionId,
        task_id: &TaskId,
    ) -> Result<Option<ResumedContext<T::Span>>, TraceError> {
        let Some(record) = self.store.take_span_record(execution_id, task_id).await? else {
            return Ok(None);
        };
        self.start_task_span(&record, execution_id, task_id).map(Some)
    }

    fn start_task_span(
        &self,
        record: &SpanRecord,
        execution_id: &ExecutionId,
        task_id: &TaskId,
    ) -> Result<ResumedContext<T::Span>, TraceError> {
        let saved = record.span_context()?;
        let parent = record.parent_context()?.unwrap_or(saved);
        let attributes = vec![
            (ORIGINAL_SPAN_ID_ATTRIBUTE.to_string(), record.span_id.clone()),
            (EXECUTION_ID_ATTRIBUTE.to_string(), execution_id.to_string()),
            (TASK_ID_ATTRIBUTE.to_string(), task_id.to_string()),
        ];
        Ok(self.start(TASK_SPAN_NAME, parent, record.span_id.clone(), record.start_time(), attributes))
    }

    async fn resume_execution(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<Option<ResumedContext<T::Span>>, TraceError> {
        let Some(record) = self.store.read_execution_record(execution_id).await? else {
            debug!(execution_id = %execution_id, "no execution span context stored");
            return Ok(None);
        };
        self.start_execution_span(&record, execution_id).map(Some)
    }

    fn start_execution_span(
        &self,
        record: &ExecutionRecord,
        execution_id: &ExecutionId,
    ) -> Result<ResumedContext<T::Span>, TraceError> {
        let parent = record.span_context()?;
        let attributes = vec![
            (ORIGINAL_SPAN_ID_ATTRIBUTE.to_string(), record.span_id.clone()),
            (EXECUTION_ID_ATTRIBUTE.to_string(), execution_id.to_string()),
        ];
        Ok(self.start(
            EXECUTION_SPAN_NAME,
            parent,
            record.span_id.clone(),
            record.start_time(),
            attributes,
        ))
    }

    fn start(
        &self,
        name: &str,
        parent: SpanContext,
        original_span_id: String,
        start_time: SystemTime,
        attributes: Vec<(String, String)>,
    ) -> ResumedContext<T::Span> {
        let span = self.tracer.start_span(SpanStart {
            name: name.to_string(),
            parent: Some(parent.clone()),
            start_time,
            attributes,
        });
        ResumedContext {
            span,
            parent,
            original_span_id,
            start_time,
        }
    }
}
