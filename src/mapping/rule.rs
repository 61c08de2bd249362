//! Mapping rule definitions.

use serde::{Deserialize, Serialize};

/// A single declarative mapping rule.
///
/// A rule reads a value from `source` (a path, a literal, or a reserved
/// field), optionally passes it through the `transform` expression, and
/// writes the result at `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRule {
    /// Where the value comes from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Expression applied to the resolved value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
    /// Path the result is written to.
    #[serde(default)]
    pub target: String,
    /// Whether a failure of this rule is logged and skipped (`true`) or
    /// aborts the remaining rules (`false`).
    #[serde(default = "default_tolerant", alias = "tolerance")]
    pub tolerant: bool,
}

fn default_tolerant() -> bool {
    true
}

impl MappingRule {
    /// Create a rule copying `source` to `target`.
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            transform: None,
            target: target.into(),
            tolerant: true,
        }
    }

    /// Create a rule producing `target` from a transform alone.
    pub fn transform_only(transform: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: None,
            transform: Some(transform.into()),
            target: target.into(),
            tolerant: true,
        }
    }

    /// Set the transform expression.
    pub fn with_transform(mut self, transform: impl Into<String>) -> Self {
        self.transform = Some(transform.into());
        self
    }

    /// Set the tolerance flag.
    pub fn with_tolerant(mut self, tolerant: bool) -> Self {
        self.tolerant = tolerant;
        self
    }

    /// A rule is usable when it has a target and something to produce.
    pub fn is_usable(&self) -> bool {
        !is_blank(Some(&self.target)) && (!is_blank(self.source.as_deref()) || self.has_transform())
    }

    /// Whether a non-blank transform is present.
    pub fn has_transform(&self) -> bool {
        !is_blank(self.transform.as_deref())
    }
}

pub(crate) fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|s| s.trim().is_empty())
}
