//! Declarative expectations on responses.
//!
//! Three kinds of checks can be mixed freely within a case:
//!
//! - status equality ([`assert_status`], [`Expectation::Status`])
//! - a [`Matcher`] applied to the value at a path expression
//!   ([`assert_body`], [`Expectation::Body`])
//! - schema conformance ([`assert_schema`], [`Expectation::Schema`])
//!
//! [`ApiResponse::then`] offers the same checks as a chain:
//!
//! ```no_run
//! # use restcheck::{ApiResponse, Error};
//! # use restcheck::assertions::{equal_to, has_items};
//! # fn check(response: &ApiResponse) -> Result<(), Error> {
//! response
//!     .then()
//!     .status(200)?
//!     .body("id", equal_to("390"))?
//!     .body("odds.price", has_items(["1.30", "5.25"]))?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::{AssertionError, Error};
use crate::http_client::ApiResponse;
use crate::json_path::JsonPath;
use crate::schema::SchemaValidator;

/// Comparison applied to an extracted value
#[derive(Debug, Clone, PartialEq)]
pub enum Matcher {
    /// Equal to this value; numbers compare with single precision tolerance
    EqualTo(Value),
    /// Not null, "", [] or {}
    NotEmpty,
    /// A list containing every one of these items, in any order
    HasItems(Vec<Value>),
    /// A list (or object, or string) with more than this many elements
    SizeGreaterThan(usize),
}

pub fn equal_to(value: impl Into<Value>) -> Matcher {
    Matcher::EqualTo(value.into())
}

pub fn not_empty() -> Matcher {
    Matcher::NotEmpty
}

pub fn has_items<I, T>(items: I) -> Matcher
where
    I: IntoIterator<Item = T>,
    T: Into<Value>,
{
    Matcher::HasItems(items.into_iter().map(Into::into).collect())
}

pub fn size_greater_than(threshold: usize) -> Matcher {
    Matcher::SizeGreaterThan(threshold)
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::EqualTo(value) => write!(f, "equal to {value}"),
            Matcher::NotEmpty => f.write_str("not empty"),
            Matcher::HasItems(items) => write!(f, "has items {}", Value::Array(items.clone())),
            Matcher::SizeGreaterThan(n) => write!(f, "size greater than {n}"),
        }
    }
}

impl Matcher {
    /// Apply the matcher to `actual`, found at `path`
    pub fn check(&self, path: &str, actual: &Value) -> Result<(), AssertionError> {
        match self {
            Matcher::EqualTo(expected) => {
                if values_equal(expected, actual) {
                    Ok(())
                } else {
                    Err(AssertionError::field_mismatch(
                        path,
                        expected.clone(),
                        actual.clone(),
                    ))
                }
            }
            Matcher::NotEmpty => {
                if is_empty(actual) {
                    Err(AssertionError::EmptyField {
                        path: path.to_string(),
                    })
                } else {
                    Ok(())
                }
            }
            Matcher::HasItems(expected) => {
                let present: Vec<&Value> = match actual {
                    Value::Array(items) => items.iter().collect(),
                    Value::Null => Vec::new(),
                    scalar => vec![scalar],
                };
                let missing: Vec<Value> = expected
                    .iter()
                    .filter(|want| !present.iter().any(|have| values_equal(want, have)))
                    .cloned()
                    .collect();
                if missing.is_empty() {
                    Ok(())
                } else {
                    Err(AssertionError::MissingItems {
                        path: path.to_string(),
                        missing,
                        actual: actual.clone(),
                    })
                }
            }
            Matcher::SizeGreaterThan(threshold) => {
                let size = size_of(actual);
                if size > *threshold {
                    Ok(())
                } else {
                    Err(AssertionError::SizeTooSmall {
                        path: path.to_string(),
                        threshold: *threshold,
                        actual: size,
                    })
                }
            }
        }
    }
}

fn numbers_equal(a: f64, b: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= f64::from(f32::EPSILON) * scale
}

/// Structural equality with tolerant number comparison
fn values_equal(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Number(a), Value::Number(b)) => {
            if a.is_f64() || b.is_f64() {
                match (a.as_f64(), b.as_f64()) {
                    (Some(a), Some(b)) => numbers_equal(a, b),
                    _ => false,
                }
            } else {
                // both integers
                a.as_i64() == b.as_i64() && a.as_u64() == b.as_u64()
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(k, v)| b.get(k).is_some_and(|w| values_equal(v, w)))
        }
        _ => expected == actual,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn size_of(value: &Value) -> usize {
    match value {
        Value::Null => 0,
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::Bool(_) | Value::Number(_) => 1,
    }
}

/// Fail unless the response carries `expected` as its status code
pub fn assert_status(response: &ApiResponse, expected: u16) -> Result<(), AssertionError> {
    if response.status_code == expected {
        Ok(())
    } else {
        debug!(
            expected,
            actual = response.status_code,
            body = %response.body,
            "Status mismatch"
        );
        Err(AssertionError::StatusMismatch {
            expected,
            actual: response.status_code,
        })
    }
}

/// Extract the value at `path` and apply `matcher` to it
pub fn assert_body(response: &ApiResponse, path: &str, matcher: &Matcher) -> Result<(), Error> {
    let expression = JsonPath::parse(path)?;
    let actual = expression.require(&response.json()?)?;
    matcher.check(path, &actual)?;
    Ok(())
}

/// Validate the whole body against a schema
pub fn assert_schema(response: &ApiResponse, validator: &SchemaValidator) -> Result<(), Error> {
    validator.validate(&response.json()?)?;
    Ok(())
}

/// A single declarative check
#[derive(Debug, Clone)]
pub enum Expectation {
    Status(u16),
    Body { path: String, matcher: Matcher },
    Schema(Arc<SchemaValidator>),
}

impl Expectation {
    pub fn body(path: impl Into<String>, matcher: Matcher) -> Self {
        Expectation::Body {
            path: path.into(),
            matcher,
        }
    }

    pub fn evaluate(&self, response: &ApiResponse) -> Result<(), Error> {
        match self {
            Expectation::Status(expected) => Ok(assert_status(response, *expected)?),
            Expectation::Body { path, matcher } => assert_body(response, path, matcher),
            Expectation::Schema(validator) => assert_schema(response, validator),
        }
    }
}

/// Check every expectation in order, stopping at the first failure
pub fn verify(response: &ApiResponse, expectations: &[Expectation]) -> Result<(), Error> {
    expectations.iter().try_for_each(|e| e.evaluate(response))
}

/// Chainable view of a response for assertions
#[derive(Debug, Clone, Copy)]
pub struct ValidatableResponse<'a> {
    response: &'a ApiResponse,
}

impl<'a> ValidatableResponse<'a> {
    pub fn status(self, expected: u16) -> Result<Self, Error> {
        assert_status(self.response, expected)?;
        Ok(self)
    }

    pub fn body(self, path: &str, matcher: Matcher) -> Result<Self, Error> {
        assert_body(self.response, path, &matcher)?;
        Ok(self)
    }

    pub fn matches_schema(self, validator: &SchemaValidator) -> Result<Self, Error> {
        assert_schema(self.response, validator)?;
        Ok(self)
    }

    pub fn response(self) -> &'a ApiResponse {
        self.response
    }
}

impl ApiResponse {
    /// Start a chain of assertions on this response
    pub fn then(&self) -> ValidatableResponse<'_> {
        ValidatableResponse { response: self }
    }
}
