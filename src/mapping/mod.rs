//! Declarative data mapping between workflow documents.
//!
//! A mapping call runs an ordered list of [`MappingRule`]s against three
//! named documents:
//!
//! - `context`: state shared by the whole workflow run
//! - `input`: the current task's resolved input
//! - `output`: the current task's produced output
//!
//! The three maps are assembled into one working document addressed as
//! `$.context`, `$.input` and `$.output`. Every rule reads and writes that
//! same document, so a rule observes the writes of the rules before it.
//! When the call returns (successfully or not) the three maps are handed
//! back to the caller with all writes applied.

mod path;
mod rule;
mod source;
mod transform;

pub use path::{JsonPath, MAX_LIST_INDEX, PathAccessor, PathError, Segment};
pub use rule::MappingRule;
pub use source::{EXECUTION_ID_KEY, SourceResolver, SourceStrategy, parse_literal};
pub use transform::{EvaluationError, ExpressionEvaluator, TransformEvaluator, UnsupportedEvaluator};

use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::MappingConfig;

/// Names of the documents inside the working document.
pub const DOCUMENT_NAMES: [&str; 3] = ["context", "input", "output"];

/// Errors that can occur while mapping.
#[derive(Debug, Error)]
pub enum MappingError {
    /// A path could not be parsed or written.
    #[error("path error: {0}")]
    Path(#[from] PathError),

    /// A transform expression failed.
    #[error("transform error: {0}")]
    Transform(#[from] EvaluationError),

    /// A rule tried to replace one of the named documents with a non-map.
    #[error("'{0}' must stay a map")]
    DocumentReplaced(String),

    /// An intolerant rule failed and aborted the mapping call.
    #[error("mapping rule #{index} (target '{target}') failed: {source}")]
    Rule {
        index: usize,
        target: String,
        #[source]
        source: Box<MappingError>,
    },
}

/// Runs mapping rules against the document set.
#[derive(Debug, Clone)]
pub struct MappingEngine {
    resolver: SourceResolver,
    transformer: TransformEvaluator,
}

impl MappingEngine {
    /// Create an engine with the given configuration and expression evaluator.
    pub fn new(config: MappingConfig, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        Self {
            resolver: SourceResolver::new(config),
            transformer: TransformEvaluator::new(evaluator),
        }
    }

    /// Apply `rules` in order to the three documents.
    ///
    /// Failures of tolerant rules are logged and skipped. The first failure
    /// of an intolerant rule stops processing and is returned; writes made
    /// by earlier rules are kept.
    pub fn mapping(
        &self,
        context: &mut Map<String, Value>,
        input: &mut Map<String, Value>,
        output: &mut Map<String, Value>,
        rules: &[MappingRule],
    ) -> Result<(), MappingError> {
        if rules.is_empty() {
            return Ok(());
        }

        let mut doc = source::compose(
            std::mem::take(context),
            std::mem::take(input),
            std::mem::take(output),
        );
        let result = self.apply_rules(&mut doc, rules);

        if let Value::Object(mut parts) = doc {
            for (name, slot) in DOCUMENT_NAMES.into_iter().zip([context, input, output]) {
                if let Some(Value::Object(map)) = parts.remove(name) {
                    *slot = map;
                }
            }
        }
        result
    }

    /// Like [`mapping`](Self::mapping), but a missing document makes the
    /// call a no-op.
    pub fn mapping_documents(
        &self,
        context: Option<&mut Map<String, Value>>,
        input: Option<&mut Map<String, Value>>,
        output: Option<&mut Map<String, Value>>,
        rules: &[MappingRule],
    ) -> Result<(), MappingError> {
        match (context, input, output) {
            (Some(context), Some(input), Some(output)) => self.mapping(context, input, output, rules),
            _ => Ok(()),
        }
    }

    /// Rules that will be applied, with their position in `rules`.
    pub fn usable_rules(rules: &[MappingRule]) -> impl Iterator<Item = (usize, &MappingRule)> {
        rules.iter().enumerate().filter(|(_, rule)| rule.is_usable())
    }

    /// Apply one rule to the working document.
    pub fn apply_rule(&self, doc: &mut Value, rule: &MappingRule) -> Result<(), MappingError> {
        let source = self.resolver.resolve(rule.source.as_deref(), doc)?;
        let value = self
            .transformer
            .apply(source, doc, rule.transform.as_deref())?;

        let Some(value) = value.filter(|v| !v.is_null()) else {
            debug!(target_path = %rule.target, "mapping rule produced no value, skipping write");
            return Ok(());
        };

        let target = JsonPath::parse(&rule.target)?;
        if let [Segment::Key(name)] = target.segments() {
            if DOCUMENT_NAMES.contains(&name.as_str()) && !value.is_object() {
                return Err(MappingError::DocumentReplaced(name.clone()));
            }
        }
        target.write(doc, value)?;
        Ok(())
    }

    fn apply_rules(&self, doc: &mut Value, rules: &[MappingRule]) -> Result<(), MappingError> {
        for (index, rule) in Self::usable_rules(rules) {
            if let Err(e) = self.apply_rule(doc, rule) {
                warn!(
                    index,
                    target_path = %rule.target,
                    tolerant = rule.tolerant,
                    error = %e,
                    "mapping rule failed"
                );
                if !rule.tolerant {
                    return Err(MappingError::Rule {
                        index,
                        target: rule.target.clone(),
                        source: Box::new(e),
                    });
                }
            }
        }
        Ok(())
    }
}
