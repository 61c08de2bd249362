//! Transform step of a mapping rule.
//!
//! The expression language itself lives behind [`ExpressionEvaluator`];
//! this module only assembles the environment an expression sees.

use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

/// Error returned by an expression evaluator.
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// The expression could not be parsed.
    #[error("malformed expression '{expression}': {message}")]
    Malformed { expression: String, message: String },

    /// The expression failed while running.
    #[error("expression '{expression}' failed: {message}")]
    Failed { expression: String, message: String },

    /// No evaluator is available for transforms.
    #[error("no expression evaluator configured for '{0}'")]
    Unsupported(String),
}

/// Evaluates transform expressions against an environment.
///
/// The environment always holds `source`, `context`, `input` and
/// `output`.
pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluate `expression` and return its value.
    fn evaluate(&self, expression: &str, env: &Map<String, Value>) -> Result<Value, EvaluationError>;
}

impl<F> ExpressionEvaluator for F
where
    F: Fn(&str, &Map<String, Value>) -> Result<Value, EvaluationError> + Send + Sync,
{
    fn evaluate(&self, expression: &str, env: &Map<String, Value>) -> Result<Value, EvaluationError> {
        self(expression, env)
    }
}

/// Evaluator that rejects every expression.
///
/// Rules with a transform fail under it; tolerant rules are skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedEvaluator;

impl ExpressionEvaluator for UnsupportedEvaluator {
    fn evaluate(&self, expression: &str, _env: &Map<String, Value>) -> Result<Value, EvaluationError> {
        Err(EvaluationError::Unsupported(expression.to_string()))
    }
}

/// Applies a rule's optional transform to its resolved source value.
#[derive(Clone)]
pub struct TransformEvaluator {
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl TransformEvaluator {
    /// Wrap an expression evaluator.
    pub fn new(evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        Self { evaluator }
    }

    /// Apply `transform` to `source`.
    ///
    /// A blank transform passes `source` through unchanged. The `doc`
    /// is the working document holding `context`, `input` and `output`.
    pub fn apply(
        &self,
        source: Option<Value>,
        doc: &Value,
        transform: Option<&str>,
    ) -> Result<Option<Value>, EvaluationError> {
        let Some(transform) = transform.filter(|t| !t.trim().is_empty()) else {
            return Ok(source);
        };

        let mut env = Map::new();
        env.insert("source".to_string(), source.unwrap_or(Value::Null));
        for name in ["context", "input", "output"] {
            let part = doc.get(name).cloned().unwrap_or_else(|| Value::Object(Map::new()));
            env.insert(name.to_string(), part);
        }

        let result = self.evaluator.evaluate(transform, &env)?;
        Ok((!result.is_null()).then_some(result))
    }
}

impl std::fmt::Debug for TransformEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformEvaluator").finish_non_exhaustive()
    }
}
