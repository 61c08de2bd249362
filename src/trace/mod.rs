//! Trace continuity across task suspension.
//!
//! A task that suspends (for example while waiting on an asynchronous
//! callback) loses its in-process span. The relay keeps the trace going:
//!
//! - [`TraceContextStore`] snapshots the active span's identifiers into a
//!   TTL-bounded key-value record when the task suspends.
//! - [`SpanRelay`] consumes that record when the task resumes and starts a
//!   new span that keeps the original parent, start time and a
//!   correlation attribute pointing at the suspended span.
//!
//! Every operation is best-effort: failures are logged and the caller
//! simply gets no trace continuity.

mod relay;
mod store;

#[cfg(feature = "otel")]
pub mod otel;

pub use relay::{EXECUTION_SPAN_NAME, ResumedContext, SpanRelay, TASK_SPAN_NAME};
pub use store::TraceContextStore;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::storage::StorageError;

/// Attribute holding the id of the span that was suspended.
pub const ORIGINAL_SPAN_ID_ATTRIBUTE: &str = "petit.original_span_id";
/// Attribute holding the execution id of a resumed span.
pub const EXECUTION_ID_ATTRIBUTE: &str = "petit.execution_id";
/// Attribute holding the task id of a resumed task span.
pub const TASK_ID_ATTRIBUTE: &str = "petit.task_id";

/// Errors raised inside the trace subsystem.
///
/// These never leave the public operations; they are logged.
#[derive(Debug, Error)]
pub enum TraceError {
    /// The key-value store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored record holds invalid identifiers.
    #[error("malformed trace record: {0}")]
    Malformed(String),
}

/// W3C trace flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TraceFlags(u8);

impl TraceFlags {
    /// The `sampled` flag.
    pub const SAMPLED: TraceFlags = TraceFlags(0x01);

    /// Create flags from their byte value.
    pub fn new(flags: u8) -> Self {
        Self(flags)
    }

    /// Whether the trace is sampled.
    pub fn is_sampled(&self) -> bool {
        self.0 & Self::SAMPLED.0 != 0
    }

    /// Byte value.
    pub fn to_u8(self) -> u8 {
        self.0
    }

    /// Two lowercase hex digits, e.g. `"01"`.
    pub fn to_hex(self) -> String {
        format!("{:02x}", self.0)
    }

    /// Parse two hex digits.
    pub fn from_hex(hex: &str) -> Result<Self, TraceError> {
        if hex.len() != 2 {
            return Err(TraceError::Malformed(format!("trace flags '{}'", hex)));
        }
        u8::from_str_radix(hex, 16)
            .map(Self)
            .map_err(|_| TraceError::Malformed(format!("trace flags '{}'", hex)))
    }
}

/// Propagated identity of a span.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpanContext {
    /// 32 lowercase hex digits.
    pub trace_id: String,
    /// 16 lowercase hex digits.
    pub span_id: String,
    /// Trace flags.
    pub trace_flags: TraceFlags,
}

impl SpanContext {
    /// Create a span context.
    pub fn new(trace_id: impl Into<String>, span_id: impl Into<String>, trace_flags: TraceFlags) -> Self {
        Self {
            trace_id: trace_id.into(),
            span_id: span_id.into(),
            trace_flags,
        }
    }

    /// Whether both ids are well-formed and non-zero.
    pub fn is_valid(&self) -> bool {
        is_hex_id(&self.trace_id, 32) && is_hex_id(&self.span_id, 16)
    }
}

impl fmt::Display for SpanContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "00-{}-{}-{}", self.trace_id, self.span_id, self.trace_flags.to_hex())
    }
}

fn is_hex_id(id: &str, len: usize) -> bool {
    id.len() == len
        && id.bytes().all(|b| b.is_ascii_hexdigit())
        && id.bytes().any(|b| b != b'0')
}

/// Snapshot of a suspended task's span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanRecord {
    pub trace_id: String,
    pub span_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    pub trace_flags: String,
    /// Wall-clock epoch milliseconds at save time.
    #[serde(rename = "startTime")]
    pub start_time_millis: u64,
}

impl SpanRecord {
    /// Snapshot `current` now, remembering `parent`.
    pub fn capture(parent: Option<&SpanContext>, current: &SpanContext) -> Self {
        Self {
            trace_id: current.trace_id.clone(),
            span_id: current.span_id.clone(),
            parent_span_id: parent.map(|p| p.span_id.clone()),
            trace_flags: current.trace_flags.to_hex(),
            start_time_millis: now_millis(),
        }
    }

    /// Context of the suspended span itself.
    pub fn span_context(&self) -> Result<SpanContext, TraceError> {
        checked_context(&self.trace_id, &self.span_id, &self.trace_flags)
    }

    /// Context of the suspended span's parent, if one was saved.
    pub fn parent_context(&self) -> Result<Option<SpanContext>, TraceError> {
        self.parent_span_id
            .as_deref()
            .map(|parent| checked_context(&self.trace_id, parent, &self.trace_flags))
            .transpose()
    }

    /// Start time as a system time.
    pub fn start_time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.start_time_millis)
    }
}

/// Snapshot of an execution's root span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub trace_id: String,
    pub span_id: String,
    pub trace_flags: String,
    /// Wall-clock epoch milliseconds at save time.
    #[serde(rename = "startTime")]
    pub start_time_millis: u64,
}

impl ExecutionRecord {
    /// Snapshot `span` now.
    pub fn capture(span: &SpanContext) -> Self {
        Self {
            trace_id: span.trace_id.clone(),
            span_id: span.span_id.clone(),
            trace_flags: span.trace_flags.to_hex(),
            start_time_millis: now_millis(),
        }
    }

    /// Context of the execution root span.
    pub fn span_context(&self) -> Result<SpanContext, TraceError> {
        checked_context(&self.trace_id, &self.span_id, &self.trace_flags)
    }

    /// Start time as a system time.
    pub fn start_time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.start_time_millis)
    }
}

fn checked_context(trace_id: &str, span_id: &str, flags: &str) -> Result<SpanContext, TraceError> {
    let context = SpanContext::new(trace_id, span_id, TraceFlags::from_hex(flags)?);
    if !context.is_valid() {
        return Err(TraceError::Malformed(format!(
            "invalid ids trace_id='{}' span_id='{}'",
            trace_id, span_id
        )));
    }
    Ok(context)
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Parameters of a span to start.
#[derive(Debug, Clone)]
pub struct SpanStart {
    /// Span name.
    pub name: String,
    /// Remote parent, if any.
    pub parent: Option<SpanContext>,
    /// Explicit start timestamp.
    pub start_time: SystemTime,
    /// String attributes.
    pub attributes: Vec<(String, String)>,
}

/// A started span.
pub trait TraceSpan {
    /// Identity of this span, for propagation to children.
    fn span_context(&self) -> SpanContext;
}

/// Tracing backend able to start spans with an explicit parent, start
/// time and attributes.
pub trait Tracer: Send + Sync {
    /// Span type produced by this tracer.
    type Span: TraceSpan + Send;

    /// Start a recording span.
    fn start_span(&self, start: SpanStart) -> Self::Span;
}
