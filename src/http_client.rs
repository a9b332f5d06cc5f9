use reqwest::header::{self, HeaderMap};
use reqwest::{Client, Method};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::error::{AssertionError, Error};
use crate::json_path::{self, JsonPath};

/// Transport timeout applied to every request
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client bound to one base URL
///
/// Every request is a single attempt: there is no retry and no per-request
/// timeout override.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: Client,
    base_url: Url,
    default_headers: HeaderMap,
    log_traffic: bool,
}

impl HttpClient {
    /// Create the user agent string for HTTP requests
    fn create_user_agent() -> String {
        format!("restcheck/{}", env!("CARGO_PKG_VERSION"))
    }

    /// Create a client for `base_url`
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built or the
    /// URL cannot serve as a base.
    pub fn new(base_url: Url) -> Result<Self, Error> {
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidUrl(format!(
                "'{base_url}' cannot be used as a base URL"
            )));
        }
        // Always terminate the path of the base_url with '/'
        let mut base_url = base_url;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let client = Client::builder()
            .user_agent(Self::create_user_agent())
            .timeout(DEFAULT_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url,
            default_headers: HeaderMap::new(),
            log_traffic: false,
        })
    }

    /// Set default headers for all requests
    #[must_use]
    pub fn with_default_headers(mut self, default_headers: HeaderMap) -> Self {
        self.default_headers = default_headers;
        self
    }

    /// Log every request and response at info level
    #[must_use]
    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.log_traffic = enabled;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, Error> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: impl Into<String>) -> Result<ApiResponse, Error> {
        self.request(Method::POST, path, Some(body.into())).await
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> Result<ApiResponse, Error> {
        self.post(path, serde_json::to_string(body)?).await
    }

    pub async fn delete(&self, path: &str, body: Option<String>) -> Result<ApiResponse, Error> {
        self.request(Method::DELETE, path, body).await
    }

    pub async fn delete_json(&self, path: &str, body: &Value) -> Result<ApiResponse, Error> {
        self.delete(path, Some(serde_json::to_string(body)?)).await
    }

    /// Issue one request relative to the base URL
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<ApiResponse, Error> {
        let url = self.build_url(path)?;

        let mut request = self
            .client
            .request(method.clone(), url.clone())
            .headers(self.default_headers.clone());
        if let Some(body) = &body {
            request = request
                .header(header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
                .body(body.clone());
        }

        let request_body = body.unwrap_or_default();
        if self.log_traffic {
            info!(
                method = %method,
                url = %url,
                headers = ?self.default_headers,
                body = %request_body,
                "Request"
            );
        } else {
            debug!(method = %method, url = %url, "Request");
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Http(format!(
                    "Request timeout after {} seconds while calling {method} {url}",
                    DEFAULT_TIMEOUT.as_secs()
                ))
            } else if e.is_connect() {
                Error::Http(format!(
                    "Connection failed to {url} - check if the server is running and the URL is correct"
                ))
            } else {
                Error::Http(format!(
                    "HTTP request failed: {e} (URL: {url}, Method: {method})"
                ))
            }
        })?;

        let response = self
            .process_response(response, &method, url.as_str(), request_body)
            .await?;

        if self.log_traffic {
            info!(
                status = response.status_code,
                headers = ?response.headers,
                body = %response.body,
                "Response"
            );
        } else {
            debug!(status = response.status_code, "Response");
        }

        Ok(response)
    }

    /// Resolve `path` (with optional query) against the base URL
    fn build_url(&self, path: &str) -> Result<Url, Error> {
        let relative = path.trim_start_matches('/');
        self.base_url
            .join(relative)
            .map_err(|e| Error::InvalidUrl(format!("Cannot join '{path}' to {}: {e}", self.base_url)))
    }

    async fn process_response(
        &self,
        response: reqwest::Response,
        method: &Method,
        url: &str,
        request_body: String,
    ) -> Result<ApiResponse, Error> {
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    value.to_str().unwrap_or("<invalid>").to_string(),
                )
            })
            .collect();

        let body = response
            .text()
            .await
            .map_err(|e| Error::Http(format!("Failed to read response body: {e}")))?;

        Ok(ApiResponse {
            status_code: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
            headers,
            body,
            is_success: status.is_success(),
            request_method: method.to_string(),
            request_url: url.to_string(),
            request_body,
        })
    }
}

/// Response to a request issued by [`HttpClient`]
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status_code: u16,
    pub status_text: String,
    /// Header names are lower case
    pub headers: HashMap<String, String>,
    pub body: String,
    pub is_success: bool,
    pub request_method: String,
    pub request_url: String,
    pub request_body: String,
}

impl ApiResponse {
    /// Try to parse the response body as JSON
    pub fn json(&self) -> Result<Value, Error> {
        serde_json::from_str(&self.body).map_err(|e| {
            AssertionError::BodyNotJson {
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Value at a path expression, `None` when nothing is there
    pub fn path(&self, expression: &str) -> Result<Option<Value>, Error> {
        json_path::extract(&self.json()?, expression)
    }

    /// Value at a path expression, failing when nothing is there
    pub fn require(&self, expression: &str) -> Result<Value, Error> {
        JsonPath::parse(expression)?.require(&self.json()?)
    }

    /// Scalar at a path expression rendered as a string
    pub fn string_at(&self, expression: &str) -> Result<String, Error> {
        let value = self.require(expression)?;
        json_path::scalar_to_string(&value).ok_or_else(|| {
            AssertionError::EmptyField {
                path: expression.to_string(),
            }
            .into()
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// One-line summary used in logs and reports
    pub fn summary(&self) -> String {
        format!(
            "{} {} -> {} {}",
            self.request_method, self.request_url, self.status_code, self.status_text
        )
    }
}
