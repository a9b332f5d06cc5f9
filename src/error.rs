//! Error handling for the restcheck harness.
//!
//! Failures fall into three groups and the types mirror that split:
//!
//! - **Setup failures** ([`Error::PortAllocation`], [`Error::MockServer`],
//!   [`Error::Fixture`]) abort a suite before any case runs.
//! - **Assertion failures** ([`Error::Assertion`]) fail a single case. The
//!   suite keeps going with the remaining cases.
//! - **Transport failures** ([`Error::Http`], [`Error::HttpRequest`]) mean the
//!   request never produced a response. There are no retries.
//!
//! An error *response* from the service under test (for example an HTTP 500
//! with an `error` message) is not an [`Error`] at all: it is an ordinary
//! [`ApiResponse`](crate::ApiResponse) that negative-path cases assert on.
//!
//! # Assertion failures
//!
//! [`AssertionError`] is serialisable so that reports can be emitted as JSON:
//!
//! ```json
//! {
//!   "type": "status-mismatch",
//!   "expected": 200,
//!   "actual": 500
//! }
//! ```
//!
//! ```json
//! {
//!   "type": "missing-field",
//!   "path": "post.articel_id",
//!   "suggestions": ["article_id"]
//! }
//! ```

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Port allocation failed: {0}")]
    PortAllocation(String),
    #[error("Fixture error: {name} - {reason}")]
    Fixture { name: String, reason: String },
    #[error("Schema error: {0}")]
    Schema(String),
    #[error("Invalid path expression '{expression}': {reason}")]
    PathExpression { expression: String, reason: String },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    MockServer(#[from] MockServerError),
    #[error(transparent)]
    Assertion(#[from] AssertionError),
    #[error(transparent)]
    Cli(#[from] CliError),
}

impl Error {
    /// Whether this error must abort the whole suite rather than a single case
    pub fn is_setup_failure(&self) -> bool {
        matches!(
            self,
            Error::PortAllocation(_)
                | Error::MockServer(_)
                | Error::Fixture { .. }
                | Error::Config(_)
                | Error::Cli(_)
        )
    }
}

/// Errors raised by the mock server lifecycle
#[derive(Debug, Error)]
pub enum MockServerError {
    #[error("Failed to bind mock server on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("Mock server is already running on port {port}")]
    AlreadyRunning { port: u16 },
    #[error("Mock server on port {port} has been stopped and cannot be reused")]
    Terminated { port: u16 },
    #[error("Mock server task failed: {0}")]
    Task(String),
    #[error("Invalid stub: {0}")]
    InvalidStub(String),
}

/// Errors produced while turning command line arguments into a configuration
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid header format in '{header}': expected 'name: value' format")]
    InvalidHeaderFormat { header: String },
    #[error("Invalid header name in '{header}': {source}")]
    InvalidHeaderName {
        header: String,
        #[source]
        source: http::header::InvalidHeaderName,
    },
    #[error("Invalid header value in '{header}': {source}")]
    InvalidHeaderValue {
        header: String,
        #[source]
        source: http::header::InvalidHeaderValue,
    },
    #[error("Suite '{suite}' needs a service base URL (--base-url or RESTCHECK_BASE_URL)")]
    MissingBaseUrl { suite: String },
}

/// A single rule of a JSON schema that the instance violated
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaViolation {
    /// JSON pointer into the validated document
    pub instance_path: String,
    /// JSON pointer into the schema to the rule that failed
    pub schema_path: String,
    /// Human readable description from the validator
    pub message: String,
}

/// Helper function to format field suggestions
fn format_suggestions(suggestions: &[String]) -> String {
    match suggestions.len() {
        0 => String::new(),
        1 => format!(" Did you mean '{}'?", suggestions[0]),
        _ => format!(" Did you mean one of these? {}", suggestions.join(", ")),
    }
}

fn format_violations(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(|v| {
            if v.instance_path.is_empty() {
                format!("(root): {}", v.message)
            } else {
                format!("{}: {}", v.instance_path, v.message)
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// A response did not meet an expectation
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AssertionError {
    /// Status code differs from the expected one
    #[error("Expected status {expected} but got {actual}")]
    #[serde(rename = "status-mismatch")]
    StatusMismatch { expected: u16, actual: u16 },

    /// Response body is not a JSON document
    #[error("Response body is not valid JSON: {message}")]
    #[serde(rename = "body-not-json")]
    BodyNotJson { message: String },

    /// Nothing found at the path expression
    #[error("No value found at '{path}'.{}", format_suggestions(suggestions))]
    #[serde(rename = "missing-field")]
    MissingField {
        path: String,
        suggestions: Vec<String>,
    },

    /// Value at the path differs from the expected value
    #[error("Value at '{path}' is {actual} but expected {expected}")]
    #[serde(rename = "field-mismatch")]
    FieldMismatch {
        path: String,
        expected: Value,
        actual: Value,
    },

    /// Value at the path is empty (null, "", [] or {})
    #[error("Value at '{path}' is empty")]
    #[serde(rename = "empty-field")]
    EmptyField { path: String },

    /// Extracted list lacks some of the expected items
    #[error("Value at '{path}' is missing items {}", Value::Array(missing.clone()))]
    #[serde(rename = "missing-items")]
    MissingItems {
        path: String,
        missing: Vec<Value>,
        actual: Value,
    },

    /// Extracted list is not larger than the threshold
    #[error("Value at '{path}' has {actual} items but more than {threshold} were expected")]
    #[serde(rename = "size-too-small")]
    SizeTooSmall {
        path: String,
        threshold: usize,
        actual: usize,
    },

    /// Response body does not conform to a schema
    #[error("Body does not match schema '{schema}': {}", format_violations(violations))]
    #[serde(rename = "schema-violation")]
    SchemaViolation {
        schema: String,
        violations: Vec<SchemaViolation>,
    },
}

impl AssertionError {
    /// Create a missing field error with suggestions
    pub fn missing_field(path: impl Into<String>, suggestions: Vec<String>) -> Self {
        Self::MissingField {
            path: path.into(),
            suggestions,
        }
    }

    /// Create a field mismatch error
    pub fn field_mismatch(path: impl Into<String>, expected: Value, actual: Value) -> Self {
        Self::FieldMismatch {
            path: path.into(),
            expected,
            actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_json_snapshot;
    use serde_json::json;

    #[test]
    fn test_status_mismatch_serialization() {
        let error = AssertionError::StatusMismatch {
            expected: 200,
            actual: 500,
        };

        let serialized = serde_json::to_value(&error).unwrap();
        insta::with_settings!({ sort_maps => true }, {
            assert_json_snapshot!(serialized, @r###"
            {
              "actual": 500,
              "expected": 200,
              "type": "status-mismatch"
            }
            "###);
        });
    }

    #[test]
    fn test_missing_field_message_with_suggestions() {
        let error = AssertionError::missing_field("post.articel_id", vec!["article_id".into()]);
        assert_eq!(
            error.to_string(),
            "No value found at 'post.articel_id'. Did you mean 'article_id'?"
        );

        let error = AssertionError::missing_field("dta", vec!["data".into(), "date".into()]);
        assert_eq!(
            error.to_string(),
            "No value found at 'dta'. Did you mean one of these? data, date"
        );

        let error = AssertionError::missing_field("nothing", vec![]);
        assert_eq!(error.to_string(), "No value found at 'nothing'.");
    }

    #[test]
    fn test_schema_violation_lists_every_rule() {
        let error = AssertionError::SchemaViolation {
            schema: "booksSchema.json".to_string(),
            violations: vec![
                SchemaViolation {
                    instance_path: String::new(),
                    schema_path: "/required".to_string(),
                    message: "\"data\" is a required property".to_string(),
                },
                SchemaViolation {
                    instance_path: "/count".to_string(),
                    schema_path: "/properties/count/type".to_string(),
                    message: "\"two\" is not of type \"integer\"".to_string(),
                },
            ],
        };

        let message = error.to_string();
        assert!(message.contains("booksSchema.json"));
        assert!(message.contains("(root): \"data\" is a required property"));
        assert!(message.contains("/count: \"two\" is not of type \"integer\""));
    }

    #[test]
    fn test_missing_items_serialization() {
        let error = AssertionError::MissingItems {
            path: "odds.price".to_string(),
            missing: vec![json!("9.99")],
            actual: json!(["1.30", "5.25"]),
        };

        let serialized = serde_json::to_value(&error).unwrap();
        assert_eq!(serialized["type"], "missing-items");
        assert_eq!(serialized["missing"], json!(["9.99"]));
        assert_eq!(
            error.to_string(),
            "Value at 'odds.price' is missing items [\"9.99\"]"
        );
    }

    #[test]
    fn test_setup_failures_are_classified() {
        assert!(Error::PortAllocation("no sockets".into()).is_setup_failure());
        assert!(
            Error::MockServer(MockServerError::AlreadyRunning { port: 1 }).is_setup_failure()
        );
        assert!(
            !Error::Assertion(AssertionError::EmptyField {
                path: "data".into()
            })
            .is_setup_failure()
        );
        assert!(!Error::Http("boom".into()).is_setup_failure());
    }
}
