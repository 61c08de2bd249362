//! Source resolution for mapping rules.
//!
//! A rule's `source` string is classified into a [`SourceStrategy`] and
//! then resolved against the working document.

use serde_json::{Map, Value};

use super::MappingError;
use super::path::JsonPath;
use crate::config::MappingConfig;

/// Prefix of sources addressing another task's reserved fields.
const TASKS_PREFIX: &str = "$.tasks.";
/// Reserved per-task field resolving to the task's callback URL.
const TRIGGER_URL_FIELD: &str = "trigger_url";
/// Prefix forcing the remainder to be read as a literal.
const LITERAL_PREFIX: &str = "literal:";
/// Context key holding the current execution id.
pub const EXECUTION_ID_KEY: &str = "flow_execution_id";

/// How a source string is turned into a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStrategy<'a> {
    /// Callback URL of `task_name`, with an optional extra query.
    TriggerUrl {
        task_name: &'a str,
        query: Option<&'a str>,
    },
    /// Lookup in the working document.
    Path(&'a str),
    /// Literal text to parse.
    Literal(&'a str),
}

impl<'a> SourceStrategy<'a> {
    /// Classify a source string.
    pub fn classify(source: &'a str) -> Self {
        if let Some(rest) = source.strip_prefix(TASKS_PREFIX) {
            let mut parts = rest.splitn(2, '.');
            if let (Some(task_name), Some(field)) = (parts.next(), parts.next()) {
                if field == TRIGGER_URL_FIELD {
                    return SourceStrategy::TriggerUrl {
                        task_name,
                        query: None,
                    };
                }
                if let Some(query) = field
                    .strip_prefix(TRIGGER_URL_FIELD)
                    .and_then(|q| q.strip_prefix('?'))
                {
                    return SourceStrategy::TriggerUrl {
                        task_name,
                        query: Some(query),
                    };
                }
            }
        }

        if source.starts_with('$') {
            SourceStrategy::Path(source)
        } else if let Some(literal) = source.strip_prefix(LITERAL_PREFIX) {
            SourceStrategy::Literal(literal)
        } else {
            SourceStrategy::Literal(source)
        }
    }
}

/// Resolves rule sources to values.
#[derive(Debug, Clone, Default)]
pub struct SourceResolver {
    config: MappingConfig,
}

impl SourceResolver {
    /// Create a resolver using `config` for reserved fields.
    pub fn new(config: MappingConfig) -> Self {
        Self { config }
    }

    /// Resolve `source` against the working document.
    ///
    /// `None` means the rule produced nothing. Malformed paths are errors.
    pub fn resolve(&self, source: Option<&str>, doc: &Value) -> Result<Option<Value>, MappingError> {
        let Some(source) = source else {
            return Ok(None);
        };

        match SourceStrategy::classify(source) {
            SourceStrategy::TriggerUrl { task_name, query } => {
                Ok(Some(Value::String(self.trigger_url(task_name, query, doc))))
            }
            SourceStrategy::Path(path) => Ok(JsonPath::parse(path)?.read(doc)),
            SourceStrategy::Literal(text) => Ok(Some(parse_literal(text))),
        }
    }

    fn trigger_url(&self, task_name: &str, query: Option<&str>, doc: &Value) -> String {
        let execution_id = doc
            .get("context")
            .and_then(|c| c.get(EXECUTION_ID_KEY))
            .map(|id| match id {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();

        let mut url = format!(
            "{}{}?execution_id={}&task_name={}",
            self.config.server_host, self.config.trigger_uri, execution_id, task_name
        );
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push('&');
            url.push_str(query);
        }
        url
    }
}

/// Parse literal text into the most specific value it represents.
///
/// Order: JSON object or array, boolean (case-insensitive), number
/// (`f64` when a decimal point is present, `i64` otherwise; exponent
/// forms such as `1e5` become `i64` when integral), raw string.
pub fn parse_literal(source: &str) -> Value {
    let trimmed = source.trim();
    if trimmed.is_empty() {
        return Value::String(source.to_string());
    }

    if let Ok(value @ (Value::Object(_) | Value::Array(_))) = serde_json::from_str::<Value>(trimmed) {
        return value;
    }

    match trimmed.to_ascii_lowercase().as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }

    if trimmed.contains('.') {
        if let Some(number) = trimmed
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .and_then(serde_json::Number::from_f64)
        {
            return Value::Number(number);
        }
    } else if let Ok(integer) = trimmed.parse::<i64>() {
        return Value::from(integer);
    } else if trimmed.contains(['e', 'E']) {
        if let Some(number) = trimmed.parse::<f64>().ok().filter(|f| f.is_finite()) {
            if number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
                return Value::from(number as i64);
            }
            if let Some(number) = serde_json::Number::from_f64(number) {
                return Value::Number(number);
            }
        }
    }

    Value::String(source.to_string())
}

/// Build the working document from the three named maps.
pub(crate) fn compose(context: Map<String, Value>, input: Map<String, Value>, output: Map<String, Value>) -> Value {
    let mut doc = Map::new();
    doc.insert("context".to_string(), Value::Object(context));
    doc.insert("input".to_string(), Value::Object(input));
    doc.insert("output".to_string(), Value::Object(output));
    Value::Object(doc)
}
