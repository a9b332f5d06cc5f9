//! Path expressions for pulling values out of JSON response bodies.
//!
//! Two syntaxes are accepted:
//!
//! - Dotted paths such as `data.title`, `odd.ck` or `odds.price[0]`. Stepping
//!   into a field of an array maps over its elements, so `data.title` on
//!   `{"data": [{"title": "a"}, {"title": "b"}]}` yields `["a", "b"]`. `[n]`
//!   indexes an array (negative counts from the end) and `[*]` spreads an array
//!   or the values of an object.
//! - JSONPath when the expression starts with `$`, e.g. `$.data[*].title`. A
//!   single match is returned as is, several matches as an array.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{AssertionError, Error};

const SUGGESTION_THRESHOLD: f64 = 0.7;
const MAX_SUGGESTIONS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Field(String),
    Index(i64),
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Dotted(Vec<Segment>),
    JsonPath,
}

/// A parsed path expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    expression: String,
    kind: Kind,
}

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| {
        Regex::new(r"^(?P<name>[^\[\]]*)(?P<indexes>(?:\[(?:-?\d+|\*)\])*)$")
            .expect("token pattern is valid")
    })
}

fn index_regex() -> &'static Regex {
    static INDEX: OnceLock<Regex> = OnceLock::new();
    INDEX.get_or_init(|| Regex::new(r"\[(-?\d+|\*)\]").expect("index pattern is valid"))
}

impl JsonPath {
    /// Parse an expression
    ///
    /// # Errors
    ///
    /// Returns [`Error::PathExpression`] for empty expressions, empty segments
    /// (`a..b`) and malformed brackets.
    pub fn parse(expression: &str) -> Result<Self, Error> {
        let invalid = |reason: &str| Error::PathExpression {
            expression: expression.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(invalid("expression is empty"));
        }
        if trimmed.starts_with('$') {
            return Ok(Self {
                expression: trimmed.to_string(),
                kind: Kind::JsonPath,
            });
        }

        let mut segments = Vec::new();
        for token in trimmed.split('.') {
            let captures = token_regex()
                .captures(token)
                .ok_or_else(|| invalid(&format!("malformed segment '{token}'")))?;
            let name = captures.name("name").map_or("", |m| m.as_str());
            let indexes = captures.name("indexes").map_or("", |m| m.as_str());
            if name.is_empty() && indexes.is_empty() {
                return Err(invalid("empty segment"));
            }
            if !name.is_empty() {
                segments.push(Segment::Field(name.to_string()));
            }
            for index in index_regex().captures_iter(indexes) {
                let raw = &index[1];
                if raw == "*" {
                    segments.push(Segment::Wildcard);
                } else {
                    let n = raw
                        .parse::<i64>()
                        .map_err(|e| invalid(&format!("bad index '{raw}': {e}")))?;
                    segments.push(Segment::Index(n));
                }
            }
        }

        Ok(Self {
            expression: trimmed.to_string(),
            kind: Kind::Dotted(segments),
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Value at this path, if any
    pub fn select(&self, document: &Value) -> Result<Option<Value>, Error> {
        match self.evaluate(document)? {
            Lookup::Found(value) => Ok(Some(value)),
            Lookup::Missing { .. } => Ok(None),
        }
    }

    /// Value at this path, or an assertion failure suggesting nearby keys
    pub fn require(&self, document: &Value) -> Result<Value, Error> {
        match self.evaluate(document)? {
            Lookup::Found(value) => Ok(value),
            Lookup::Missing { field, siblings } => {
                let suggestions = field
                    .map(|f| similar_keys(&f, &siblings))
                    .unwrap_or_default();
                Err(AssertionError::missing_field(&self.expression, suggestions).into())
            }
        }
    }

    fn evaluate(&self, document: &Value) -> Result<Lookup, Error> {
        match &self.kind {
            Kind::JsonPath => {
                let matches = jsonpath_lib::select(document, &self.expression).map_err(|e| {
                    Error::PathExpression {
                        expression: self.expression.clone(),
                        reason: format!("{e:?}"),
                    }
                })?;
                Ok(match matches.len() {
                    0 => Lookup::Missing {
                        field: None,
                        siblings: Vec::new(),
                    },
                    1 => Lookup::Found(matches[0].clone()),
                    _ => Lookup::Found(Value::Array(matches.into_iter().cloned().collect())),
                })
            }
            Kind::Dotted(segments) => Ok(walk(document, segments)),
        }
    }
}

enum Lookup {
    Found(Value),
    Missing {
        field: Option<String>,
        siblings: Vec<String>,
    },
}

fn walk(document: &Value, segments: &[Segment]) -> Lookup {
    let mut current = document.clone();
    for segment in segments {
        match step(&current, segment) {
            Some(next) => current = next,
            None => {
                let (field, siblings) = match (segment, &current) {
                    (Segment::Field(name), Value::Object(map)) => {
                        (Some(name.clone()), map.keys().cloned().collect())
                    }
                    (Segment::Field(name), Value::Array(items)) => (
                        Some(name.clone()),
                        items
                            .iter()
                            .filter_map(Value::as_object)
                            .flat_map(|m| m.keys().cloned())
                            .collect(),
                    ),
                    _ => (None, Vec::new()),
                };
                return Lookup::Missing { field, siblings };
            }
        }
    }
    Lookup::Found(current)
}

fn step(value: &Value, segment: &Segment) -> Option<Value> {
    match (segment, value) {
        (Segment::Field(name), Value::Object(map)) => map.get(name).cloned(),
        (Segment::Field(_), Value::Array(items)) => {
            if items.is_empty() {
                return Some(Value::Array(Vec::new()));
            }
            let collected: Vec<Value> = items
                .iter()
                .filter_map(|item| step(item, segment))
                .collect();
            if collected.is_empty() {
                None
            } else {
                Some(Value::Array(collected))
            }
        }
        (Segment::Index(index), Value::Array(items)) => {
            let len = items.len() as i64;
            let position = if *index < 0 { len + index } else { *index };
            if (0..len).contains(&position) {
                items.get(position as usize).cloned()
            } else {
                None
            }
        }
        (Segment::Wildcard, Value::Array(items)) => Some(Value::Array(items.clone())),
        (Segment::Wildcard, Value::Object(map)) => {
            Some(Value::Array(map.values().cloned().collect()))
        }
        _ => None,
    }
}

/// Keys that look like `wanted`, best match first
fn similar_keys(wanted: &str, candidates: &[String]) -> Vec<String> {
    let mut scored: Vec<(f64, &String)> = candidates
        .iter()
        .map(|c| (strsim::jaro(wanted, c), c))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    let mut suggestions: Vec<String> = Vec::new();
    for (_, key) in scored {
        if !suggestions.contains(key) {
            suggestions.push(key.clone());
        }
        if suggestions.len() == MAX_SUGGESTIONS {
            break;
        }
    }
    suggestions
}

/// Convenience for one-off lookups
pub fn extract(document: &Value, expression: &str) -> Result<Option<Value>, Error> {
    JsonPath::parse(expression)?.select(document)
}

/// Render a scalar the way a string getter would: strings unquoted, numbers and
/// booleans in their JSON form. `null` and missing values give `None`.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}
