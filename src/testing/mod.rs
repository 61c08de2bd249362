//! Testing utilities for users of the relay library.
//!
//! This module provides stand-ins for the external seams:
//!
//! - [`RecordingTracer`]: A tracer that records every span it starts
//! - [`FnEvaluator`]: An expression evaluator backed by a closure, counting calls
//! - [`ArithmeticEvaluator`]: Evaluates `a <op> b` over environment paths and numbers
//! - [`FailingStore`]: A key-value store whose every operation fails

use async_trait::async_trait;
use serde_json::{Map, Number, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

use crate::mapping::{EvaluationError, ExpressionEvaluator};
use crate::storage::{KeyValueStore, StorageError};
use crate::trace::{SpanContext, SpanStart, TraceFlags, TraceSpan, Tracer};

/// A span started by [`RecordingTracer`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSpan {
    /// Span name.
    pub name: String,
    /// Parent the span was started under.
    pub parent: Option<SpanContext>,
    /// Requested start time.
    pub start_time: SystemTime,
    /// Attributes in the order they were given.
    pub attributes: Vec<(String, String)>,
    /// Identity assigned to the span.
    pub context: SpanContext,
}

impl RecordedSpan {
    /// Value of attribute `key`.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl TraceSpan for RecordedSpan {
    fn span_context(&self) -> SpanContext {
        self.context.clone()
    }
}

/// A tracer that records the spans it starts.
///
/// New spans inherit the parent's trace id and flags; root spans get a
/// fresh trace id. Span ids are random.
///
/// # Example
///
/// ```
/// use petit_relay::testing::RecordingTracer;
/// use petit_relay::trace::{SpanStart, TraceSpan, Tracer};
/// use std::time::SystemTime;
///
/// let tracer = RecordingTracer::new();
/// let span = tracer.start_span(SpanStart {
///     name: "root".into(),
///     parent: None,
///     start_time: SystemTime::now(),
///     attributes: vec![],
/// });
/// assert!(span.span_context().is_valid());
/// assert_eq!(tracer.started().len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct RecordingTracer {
    started: Arc<RwLock<Vec<RecordedSpan>>>,
}

impl RecordingTracer {
    /// Create a tracer with no recorded spans.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spans started so far, oldest first.
    pub fn started(&self) -> Vec<RecordedSpan> {
        self.started.read().map(|s| s.clone()).unwrap_or_default()
    }

    /// Start a root span, e.g. to obtain a context to save.
    pub fn root_span(&self, name: &str) -> RecordedSpan {
        self.start_span(SpanStart {
            name: name.to_string(),
            parent: None,
            start_time: SystemTime::now(),
            attributes: Vec::new(),
        })
    }

    /// Start a child of `parent`.
    pub fn child_span(&self, name: &str, parent: &SpanContext) -> RecordedSpan {
        self.start_span(SpanStart {
            name: name.to_string(),
            parent: Some(parent.clone()),
            start_time: SystemTime::now(),
            attributes: Vec::new(),
        })
    }
}

impl Tracer for RecordingTracer {
    type Span = RecordedSpan;

    fn start_span(&self, start: SpanStart) -> RecordedSpan {
        let span_id = uuid::Uuid::new_v4().simple().to_string()[..16].to_string();
        let context = match &start.parent {
            Some(parent) => SpanContext::new(parent.trace_id.clone(), span_id, parent.trace_flags),
            None => SpanContext::new(
                uuid::Uuid::new_v4().simple().to_string(),
                span_id,
                TraceFlags::SAMPLED,
            ),
        };

        let span = RecordedSpan {
            name: start.name,
            parent: start.parent,
            start_time: start.start_time,
            attributes: start.attributes,
            context,
        };
        if let Ok(mut started) = self.started.write() {
            started.push(span.clone());
        }
        span
    }
}

type EvalFn = dyn Fn(&str, &Map<String, Value>) -> Result<Value, EvaluationError> + Send + Sync;

/// An expression evaluator backed by a closure.
///
/// Counts how many expressions it was asked to evaluate.
pub struct FnEvaluator {
    eval: Box<EvalFn>,
    calls: AtomicUsize,
}

impl FnEvaluator {
    /// Wrap `eval`.
    pub fn new<F>(eval: F) -> Self
    where
        F: Fn(&str, &Map<String, Value>) -> Result<Value, EvaluationError> + Send + Sync + 'static,
    {
        Self {
            eval: Box::new(eval),
            calls: AtomicUsize::new(0),
        }
    }

    /// An evaluator returning `value` for every expression.
    pub fn constant(value: Value) -> Self {
        Self::new(move |_, _| Ok(value.clone()))
    }

    /// An evaluator failing every expression with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(move |expression, _| {
            Err(EvaluationError::Failed {
                expression: expression.to_string(),
                message: message.clone(),
            })
        })
    }

    /// Number of evaluations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ExpressionEvaluator for FnEvaluator {
    fn evaluate(&self, expression: &str, env: &Map<String, Value>) -> Result<Value, EvaluationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.eval)(expression, env)
    }
}

/// Evaluates `<operand> <op> <operand>` or a single operand.
///
/// Operands are numbers or dotted names looked up in the environment
/// (`input.x`, `source`). Operators are `+`, `-`, `*` and `/`. Integer
/// operands stay integers except under `/`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArithmeticEvaluator;

impl ExpressionEvaluator for ArithmeticEvaluator {
    fn evaluate(&self, expression: &str, env: &Map<String, Value>) -> Result<Value, EvaluationError> {
        let malformed = |message: &str| EvaluationError::Malformed {
            expression: expression.to_string(),
            message: message.to_string(),
        };
        let tokens: Vec<&str> = expression.split_whitespace().collect();
        match tokens.as_slice() {
            [operand] => Ok(operand_value(operand, env)),
            [lhs, op, rhs] => {
                let lhs = operand_value(lhs, env);
                let rhs = operand_value(rhs, env);
                arithmetic(expression, &lhs, op, &rhs)
            }
            _ => Err(malformed("expected '<operand> <op> <operand>'")),
        }
    }
}

fn operand_value(token: &str, env: &Map<String, Value>) -> Value {
    if let Ok(n) = token.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = token.parse::<f64>() {
        return Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null);
    }
    let mut parts = token.split('.');
    let first = parts.next().and_then(|name| env.get(name));
    parts
        .fold(first, |value, key| value.and_then(|v| v.get(key)))
        .cloned()
        .unwrap_or(Value::Null)
}

fn arithmetic(expression: &str, lhs: &Value, op: &str, rhs: &Value) -> Result<Value, EvaluationError> {
    let failed = |message: String| EvaluationError::Failed {
        expression: expression.to_string(),
        message,
    };

    if let (Some(a), Some(b), true) = (lhs.as_i64(), rhs.as_i64(), op != "/") {
        let result = match op {
            "+" => a.checked_add(b),
            "-" => a.checked_sub(b),
            "*" => a.checked_mul(b),
            _ => return Err(failed(format!("unknown operator '{}'", op))),
        };
        return result
            .map(Value::from)
            .ok_or_else(|| failed("integer overflow".to_string()));
    }

    let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) else {
        return Err(failed(format!("operands {} and {} are not numbers", lhs, rhs)));
    };
    let result = match op {
        "+" => a + b,
        "-" => a - b,
        "*" => a * b,
        "/" if b == 0.0 => return Err(failed("division by zero".to_string())),
        "/" => a / b,
        _ => return Err(failed(format!("unknown operator '{}'", op))),
    };
    Number::from_f64(result)
        .map(Value::Number)
        .ok_or_else(|| failed("result is not finite".to_string()))
}

/// A key-value store that is always unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingStore;

impl FailingStore {
    fn error() -> StorageError {
        StorageError::Unavailable("injected failure".to_string())
    }
}

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(Self::error())
    }

    async fn set(&self, _key: &str, _value: String) -> Result<(), StorageError> {
        Err(Self::error())
    }

    async fn expire(&self, _key: &str, _ttl: Duration) -> Result<bool, StorageError> {
        Err(Self::error())
    }

    async fn del(&self, _key: &str) -> Result<bool, StorageError> {
        Err(Self::error())
    }
}
