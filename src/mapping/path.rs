//! Path addressing over JSON-like documents.
//!
//! Paths use the JSONPath subset needed by mapping rules:
//!
//! - `$` the document root
//! - `.name` or `['name']` / `["name"]` a map key
//! - `[3]` a list index
//! - `.*` or `[*]` every child (reads only)
//!
//! Writes auto-vivify: missing map keys become maps, missing list slots
//! are padded with `null`, and the container created at each step is a
//! list when the *next* segment is an index and a map otherwise.

use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Errors raised while parsing or writing a path.
#[derive(Debug, Error)]
pub enum PathError {
    /// The expression does not start at the document root.
    #[error("path must start with '$': {0}")]
    MissingRoot(String),

    /// The expression is not valid path syntax.
    #[error("invalid path '{path}' at offset {offset}: {message}")]
    Syntax {
        path: String,
        offset: usize,
        message: String,
    },

    /// Wildcards select many nodes and cannot be written or deleted.
    #[error("wildcard segments cannot be written: {0}")]
    WildcardWrite(String),

    /// The root itself cannot be replaced.
    #[error("cannot write the document root")]
    RootWrite,

    /// An existing scalar sits where a container is required.
    #[error("cannot descend into {found} at segment {segment} of '{path}'")]
    NotAContainer {
        path: String,
        segment: String,
        found: &'static str,
    },

    /// A write would pad a list beyond [`MAX_LIST_INDEX`].
    #[error("list index {index} in '{path}' exceeds the maximum of {max}")]
    IndexTooLarge {
        path: String,
        index: usize,
        max: usize,
    },
}

/// Largest list index a write may pad up to.
pub const MAX_LIST_INDEX: usize = 1 << 20;

/// One step of a parsed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Map key, already unquoted.
    Key(String),
    /// List index.
    Index(usize),
    /// Every child of the current node.
    Wildcard,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => write!(f, "['{}']", key),
            Segment::Index(index) => write!(f, "[{}]", index),
            Segment::Wildcard => write!(f, "[*]"),
        }
    }
}

/// A parsed, validated path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    raw: String,
    segments: Vec<Segment>,
}

impl JsonPath {
    /// Parse a path expression.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        let raw = path.trim();
        let Some(rest) = raw.strip_prefix('$') else {
            return Err(PathError::MissingRoot(path.to_string()));
        };

        let chars: Vec<char> = rest.chars().collect();
        let mut segments = Vec::new();
        let mut pos = 0;
        let syntax = |offset: usize, message: &str| PathError::Syntax {
            path: raw.to_string(),
            offset: offset + 1,
            message: message.to_string(),
        };

        while pos < chars.len() {
            match chars[pos] {
                '.' => {
                    pos += 1;
                    match chars.get(pos) {
                        None => return Err(syntax(pos, "path ends with '.'")),
                        Some('.') => return Err(syntax(pos, "deep scan is not supported")),
                        Some('*') => {
                            segments.push(Segment::Wildcard);
                            pos += 1;
                        }
                        Some(_) => {
                            let start = pos;
                            while pos < chars.len() && chars[pos] != '.' && chars[pos] != '[' {
                                pos += 1;
                            }
                            let key: String = chars[start..pos].iter().collect();
                            let key = key.trim();
                            if key.is_empty() {
                                return Err(syntax(start, "empty key"));
                            }
                            segments.push(Segment::Key(key.to_string()));
                        }
                    }
                }
                '[' => {
                    let (segment, next) = parse_bracket(&chars, pos).map_err(|(offset, message)| {
                        syntax(offset, &message)
                    })?;
                    segments.push(segment);
                    pos = next;
                }
                _ => return Err(syntax(pos, "expected '.' or '['")),
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The expression as written (trimmed).
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The parsed segments, root excluded.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether the path selects more than one node.
    pub fn has_wildcard(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Wildcard))
    }

    /// Read the addressed value.
    ///
    /// Unmatched paths yield `None`. Wildcard paths yield a list of every
    /// match (possibly empty).
    pub fn read(&self, doc: &Value) -> Option<Value> {
        if self.has_wildcard() {
            let mut matches = Vec::new();
            collect(doc, &self.segments, &mut matches);
            return Some(Value::Array(matches));
        }

        let mut current = doc;
        for segment in &self.segments {
            current = match (current, segment) {
                (Value::Object(map), Segment::Key(key)) => map.get(key)?,
                (Value::Object(map), Segment::Index(index)) => map.get(&index.to_string())?,
                (Value::Array(list), Segment::Index(index)) => list.get(*index)?,
                _ => return None,
            };
        }
        Some(current.clone())
    }

    /// Write `value` at this path, creating intermediate containers.
    pub fn write(&self, doc: &mut Value, value: Value) -> Result<(), PathError> {
        if self.has_wildcard() {
            return Err(PathError::WildcardWrite(self.raw.clone()));
        }
        let Some((last, parents)) = self.segments.split_last() else {
            return Err(PathError::RootWrite);
        };
        // checked before anything is created so a rejected write leaves no trace
        if let Some(index) = self.segments.iter().find_map(|s| match s {
            Segment::Index(index) if *index > MAX_LIST_INDEX => Some(*index),
            _ => None,
        }) {
            return Err(PathError::IndexTooLarge {
                path: self.raw.clone(),
                index,
                max: MAX_LIST_INDEX,
            });
        }

        let mut current = doc;
        for (i, segment) in parents.iter().enumerate() {
            let next = &self.segments[i + 1];
            current = self.descend(current, segment, next)?;
        }

        match (current, last) {
            (Value::Object(map), Segment::Key(key)) => {
                map.insert(key.clone(), value);
            }
            (Value::Object(map), Segment::Index(index)) => {
                map.insert(index.to_string(), value);
            }
            (Value::Array(list), Segment::Index(index)) => {
                pad(list, *index);
                list[*index] = value;
            }
            (other, segment) => return Err(self.not_a_container(other, segment)),
        }
        Ok(())
    }

    /// Remove the addressed element, returning it.
    pub fn remove(&self, doc: &mut Value) -> Option<Value> {
        if self.has_wildcard() {
            return None;
        }
        let (last, parents) = self.segments.split_last()?;

        let mut current = doc;
        for segment in parents {
            current = match (current, segment) {
                (Value::Object(map), Segment::Key(key)) => map.get_mut(key)?,
                (Value::Object(map), Segment::Index(index)) => map.get_mut(&index.to_string())?,
                (Value::Array(list), Segment::Index(index)) => list.get_mut(*index)?,
                _ => return None,
            };
        }

        match (current, last) {
            (Value::Object(map), Segment::Key(key)) => map.remove(key),
            (Value::Object(map), Segment::Index(index)) => map.remove(&index.to_string()),
            (Value::Array(list), Segment::Index(index)) if *index < list.len() => {
                Some(list.remove(*index))
            }
            _ => None,
        }
    }

    /// Step into `segment`, making sure the slot holds the container that
    /// `next` needs.
    fn descend<'a>(
        &self,
        current: &'a mut Value,
        segment: &Segment,
        next: &Segment,
    ) -> Result<&'a mut Value, PathError> {
        let slot = match (current, segment) {
            (Value::Object(map), Segment::Key(key)) => {
                map.entry(key.clone()).or_insert(Value::Null)
            }
            (Value::Object(map), Segment::Index(index)) => {
                map.entry(index.to_string()).or_insert(Value::Null)
            }
            (Value::Array(list), Segment::Index(index)) => {
                pad(list, *index);
                &mut list[*index]
            }
            (other, segment) => return Err(self.not_a_container(other, segment)),
        };

        match next {
            Segment::Index(index) => {
                if !slot.is_array() {
                    *slot = Value::Array(Vec::new());
                }
                if let Value::Array(list) = &mut *slot {
                    pad(list, *index);
                }
            }
            _ => {
                if slot.is_null() {
                    *slot = Value::Object(Map::new());
                }
            }
        }
        Ok(slot)
    }

    fn not_a_container(&self, found: &Value, segment: &Segment) -> PathError {
        PathError::NotAContainer {
            path: self.raw.clone(),
            segment: segment.to_string(),
            found: kind(found),
        }
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for JsonPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Document accessor used by the mapping engine.
///
/// `get` is lenient: malformed or unmatched paths read as `None`.
/// `set` reports malformed paths and scalar collisions as errors.
pub struct PathAccessor;

impl PathAccessor {
    /// Read the value at `path`, or `None`.
    pub fn get(doc: &Value, path: &str) -> Option<Value> {
        JsonPath::parse(path).ok()?.read(doc)
    }

    /// Write `value` at `path`, auto-vivifying intermediates.
    pub fn set(doc: &mut Value, value: Value, path: &str) -> Result<(), PathError> {
        JsonPath::parse(path)?.write(doc, value)
    }

    /// Remove the element at `path`. A missing document is a no-op.
    pub fn delete(doc: Option<&mut Value>, path: &str) -> Option<Value> {
        let doc = doc?;
        JsonPath::parse(path).ok()?.remove(doc)
    }
}

fn parse_bracket(chars: &[char], open: usize) -> Result<(Segment, usize), (usize, String)> {
    let mut pos = open + 1;
    let Some(&first) = chars.get(pos) else {
        return Err((open, "unclosed '['".to_string()));
    };

    if first == '\'' || first == '"' {
        pos += 1;
        let start = pos;
        while pos < chars.len() && chars[pos] != first {
            pos += 1;
        }
        if pos >= chars.len() {
            return Err((start, "unterminated quoted key".to_string()));
        }
        let key: String = chars[start..pos].iter().collect();
        pos += 1;
        if chars.get(pos) != Some(&']') {
            return Err((pos, "expected ']' after quoted key".to_string()));
        }
        return Ok((Segment::Key(key), pos + 1));
    }

    let start = pos;
    while pos < chars.len() && chars[pos] != ']' {
        pos += 1;
    }
    if pos >= chars.len() {
        return Err((open, "unclosed '['".to_string()));
    }
    let token: String = chars[start..pos].iter().collect();
    let token = token.trim();
    let segment = if token == "*" {
        Segment::Wildcard
    } else if !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()) {
        let index = token
            .parse::<usize>()
            .map_err(|e| (start, format!("invalid index '{}': {}", token, e)))?;
        Segment::Index(index)
    } else {
        return Err((start, format!("unsupported bracket expression '{}'", token)));
    };
    Ok((segment, pos + 1))
}

fn collect(node: &Value, segments: &[Segment], out: &mut Vec<Value>) {
    let Some((segment, rest)) = segments.split_first() else {
        out.push(node.clone());
        return;
    };

    match (node, segment) {
        (Value::Object(map), Segment::Key(key)) => {
            if let Some(child) = map.get(key) {
                collect(child, rest, out);
            }
        }
        (Value::Object(map), Segment::Index(index)) => {
            if let Some(child) = map.get(&index.to_string()) {
                collect(child, rest, out);
            }
        }
        (Value::Array(list), Segment::Index(index)) => {
            if let Some(child) = list.get(*index) {
                collect(child, rest, out);
            }
        }
        (Value::Object(map), Segment::Wildcard) => {
            for child in map.values() {
                collect(child, rest, out);
            }
        }
        (Value::Array(list), Segment::Wildcard) => {
            for child in list {
                collect(child, rest, out);
            }
        }
        _ => {}
    }
}

fn pad(list: &mut Vec<Value>, index: usize) {
    if list.len() <= index {
        list.resize(index + 1, Value::Null);
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a map",
    }
}
