//! Request matchers, canned responses and the registry that maps one to the other.

use std::hash::{Hash, Hasher};

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use indexmap::IndexMap;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::MockServerError;

/// Matches a request body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyMatcher {
    /// Body parses as JSON and equals this document (key order is irrelevant)
    Json(Value),
    /// Body equals this text byte for byte
    Exact(String),
}

impl BodyMatcher {
    fn matches(&self, body: &[u8]) -> bool {
        match self {
            BodyMatcher::Json(expected) => serde_json::from_slice::<Value>(body)
                .map(|actual| &actual == expected)
                .unwrap_or(false),
            BodyMatcher::Exact(expected) => body == expected.as_bytes(),
        }
    }
}

/// Identifies the requests a stub answers
///
/// Path and query are compared exactly, the way the request line carries them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMatcher {
    method: Method,
    path: String,
    query: Option<String>,
    body: Option<BodyMatcher>,
}

impl Hash for RequestMatcher {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.method.hash(state);
        self.path.hash(state);
        self.query.hash(state);
    }
}

impl RequestMatcher {
    /// Match `method` on a URL made of a path and an optional query, e.g. `/events?id=390`
    pub fn new(method: Method, url: &str) -> Self {
        let (path, query) = match url.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (url, None),
        };
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        Self {
            method,
            path,
            query,
            body: None,
        }
    }

    pub fn get(url: &str) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: &str) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn delete(url: &str) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Only match requests whose body is this JSON document
    pub fn with_json_body(mut self, body: Value) -> Self {
        self.body = Some(BodyMatcher::Json(body));
        self
    }

    /// Only match requests whose body is exactly this text
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(BodyMatcher::Exact(body.into()));
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Path plus query as it appears on the request line
    pub fn url(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{query}", self.path),
            None => self.path.clone(),
        }
    }

    /// Check a request against this matcher
    pub fn matches(&self, method: &Method, path: &str, query: Option<&str>, body: &[u8]) -> bool {
        if self.method != *method || self.path != path {
            return false;
        }
        // An empty query string and no query string are the same request
        let query = query.filter(|q| !q.is_empty());
        if self.query.as_deref() != query {
            return false;
        }
        self.body.as_ref().is_none_or(|m| m.matches(body))
    }
}

/// Canned response served by the mock server
#[derive(Debug, Clone, PartialEq)]
pub struct StubResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl StubResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// JSON body with a matching `Content-Type`
    pub fn with_json_body(self, body: &Value) -> Self {
        self.with_header(http::header::CONTENT_TYPE.as_str(), mime::APPLICATION_JSON.as_ref())
            .with_body(body.to_string())
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Check that status and headers are valid HTTP
    pub fn validate(&self) -> Result<(), MockServerError> {
        self.status_code()?;
        self.header_map()?;
        Ok(())
    }

    pub(crate) fn status_code(&self) -> Result<StatusCode, MockServerError> {
        StatusCode::from_u16(self.status).map_err(|e| {
            MockServerError::InvalidStub(format!("invalid status {}: {e}", self.status))
        })
    }

    pub(crate) fn header_map(&self) -> Result<HeaderMap, MockServerError> {
        let mut map = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                MockServerError::InvalidStub(format!("invalid header name '{name}': {e}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                MockServerError::InvalidStub(format!("invalid header value '{value}': {e}"))
            })?;
            map.append(name, value);
        }
        Ok(map)
    }

    /// Deterministic answer for requests no stub matches
    pub fn not_found(method: &Method, url: &str) -> Self {
        Self::new(404).with_json_body(&json!({
            "error": "no stub matched",
            "method": method.as_str(),
            "path": url,
        }))
    }
}

/// A matcher paired with the response it produces
#[derive(Debug, Clone)]
pub struct Stub {
    pub matcher: RequestMatcher,
    pub response: StubResponse,
}

impl Stub {
    pub fn new(matcher: RequestMatcher, response: StubResponse) -> Self {
        Self { matcher, response }
    }
}

/// Ordered set of stubs
///
/// Registering a matcher that is already present replaces its response in place
/// (last write wins). When several different matchers accept a request, the one
/// registered last answers.
#[derive(Debug, Clone, Default)]
pub struct StubRegistry {
    stubs: IndexMap<RequestMatcher, StubResponse>,
}

impl StubRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stub, returning the response it replaced if the matcher was already registered
    pub fn register(&mut self, stub: Stub) -> Result<Option<StubResponse>, MockServerError> {
        stub.response.validate()?;
        debug!(
            method = %stub.matcher.method(),
            url = %stub.matcher.url(),
            status = stub.response.status(),
            "Registering stub"
        );
        Ok(self.stubs.insert(stub.matcher, stub.response))
    }

    /// Find the stub answering a request
    pub fn find(
        &self,
        method: &Method,
        path: &str,
        query: Option<&str>,
        body: &[u8],
    ) -> Option<&StubResponse> {
        self.stubs
            .iter()
            .rev()
            .find(|(matcher, _)| matcher.matches(method, path, query, body))
            .map(|(_, response)| response)
    }

    /// Stubbed response for a request, or the not-found response
    pub fn respond(
        &self,
        method: &Method,
        path: &str,
        query: Option<&str>,
        body: &[u8],
    ) -> StubResponse {
        match self.find(method, path, query, body) {
            Some(response) => response.clone(),
            None => {
                let url = match query {
                    Some(q) if !q.is_empty() => format!("{path}?{q}"),
                    _ => path.to_string(),
                };
                StubResponse::not_found(method, &url)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.stubs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stubs.is_empty()
    }
}
