//! Stub-backed HTTP server for isolating tests from the network.
//!
//! A [`MockServer`] walks through `Stopped -> Starting -> Running -> Stopping ->
//! Stopped`. It binds `127.0.0.1:<port>` on [`start`](MockServer::start), serves
//! the stubs in its [`StubRegistry`] and releases the port on
//! [`stop`](MockServer::stop). Dropping a running server cancels it as well, so
//! the port is released on every exit path.
//!
//! Requests that match no stub get a `404` with a JSON body naming the method
//! and path, see [`StubResponse::not_found`].

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use http::{Method, StatusCode, Uri};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, MockServerError};
use crate::stub::{RequestMatcher, Stub, StubRegistry, StubResponse};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Lifecycle state of a [`MockServer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerState::Stopped => "stopped",
            ServerState::Starting => "starting",
            ServerState::Running => "running",
            ServerState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// A request the server received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    /// Path plus query string
    pub url: String,
    pub body: String,
    /// Status the server answered with
    pub status: u16,
}

#[derive(Debug, Default)]
struct Shared {
    registry: RwLock<StubRegistry>,
    journal: Mutex<Vec<RecordedRequest>>,
}

impl Shared {
    fn respond(&self, method: &Method, path: &str, query: Option<&str>, body: &[u8]) -> StubResponse {
        match self.registry.read() {
            Ok(registry) => registry.respond(method, path, query, body),
            Err(_) => StubResponse::new(500).with_body("stub registry lock poisoned"),
        }
    }

    fn record(&self, request: RecordedRequest) {
        if let Ok(mut journal) = self.journal.lock() {
            journal.push(request);
        }
    }
}

/// HTTP server answering requests from registered stubs
pub struct MockServer {
    port: u16,
    state: ServerState,
    terminated: bool,
    shared: Arc<Shared>,
    shutdown: Option<CancellationToken>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl fmt::Debug for MockServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockServer")
            .field("port", &self.port)
            .field("state", &self.state)
            .field("terminated", &self.terminated)
            .finish()
    }
}

impl MockServer {
    /// Create a stopped server that will listen on `port` (0 lets the OS choose at start)
    pub fn new(port: u16) -> Self {
        Self {
            port,
            state: ServerState::Stopped,
            terminated: false,
            shared: Arc::new(Shared::default()),
            shutdown: None,
            task: None,
        }
    }

    /// Create and start a server in one step
    pub async fn start_on(port: u16) -> Result<Self, Error> {
        let mut server = Self::new(port);
        server.start().await?;
        Ok(server)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ServerState::Running
    }

    /// Base URL of the server, e.g. `http://127.0.0.1:41234`
    pub fn url(&self) -> String {
        format!("http://{}:{}", Ipv4Addr::LOCALHOST, self.port)
    }

    /// Base URL as a parsed [`Url`]
    pub fn base_url(&self) -> Result<Url, Error> {
        Url::parse(&self.url()).map_err(|e| Error::InvalidUrl(format!("Invalid mock server URL: {e}")))
    }

    /// Bind the listener and begin serving stubs
    ///
    /// # Errors
    ///
    /// - [`MockServerError::Bind`] if the port is taken. This is not retried.
    /// - [`MockServerError::AlreadyRunning`] if the server is not stopped.
    /// - [`MockServerError::Terminated`] if the server was stopped before.
    pub async fn start(&mut self) -> Result<(), MockServerError> {
        if self.state != ServerState::Stopped {
            return Err(MockServerError::AlreadyRunning { port: self.port });
        }
        if self.terminated {
            return Err(MockServerError::Terminated { port: self.port });
        }

        self.state = ServerState::Starting;
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, self.port));
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(source) => {
                self.state = ServerState::Stopped;
                return Err(MockServerError::Bind {
                    port: self.port,
                    source,
                });
            }
        };
        if self.port == 0 {
            self.port = listener
                .local_addr()
                .map_err(|source| MockServerError::Bind { port: 0, source })?
                .port();
        }

        let app = Router::new()
            .fallback(handle_request)
            .with_state(Arc::clone(&self.shared));

        let token = CancellationToken::new();
        let shutdown = token.clone();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await
        });

        self.shutdown = Some(token);
        self.task = Some(task);
        self.state = ServerState::Running;
        info!(port = self.port, "Mock server started");
        Ok(())
    }

    /// Add a stub
    ///
    /// Allowed before start and while running. A stub for a matcher that is
    /// already registered replaces the earlier one.
    pub fn register_stub(
        &self,
        matcher: RequestMatcher,
        response: StubResponse,
    ) -> Result<(), MockServerError> {
        if self.terminated {
            return Err(MockServerError::Terminated { port: self.port });
        }
        let mut registry = self
            .shared
            .registry
            .write()
            .map_err(|_| MockServerError::Task("stub registry lock poisoned".to_string()))?;
        if registry.register(Stub::new(matcher, response))?.is_some() {
            debug!(port = self.port, "Stub replaced an earlier one for the same matcher");
        }
        Ok(())
    }

    /// Number of registered stubs
    pub fn stub_count(&self) -> usize {
        self.shared.registry.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Answer a request the way the running server would, without going through the network
    pub fn handle(&self, method: &Method, url: &str, body: &[u8]) -> StubResponse {
        let (path, query) = match url.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (url, None),
        };
        self.shared.respond(method, path, query, body)
    }

    /// Requests received so far, oldest first
    pub fn received_requests(&self) -> Vec<RecordedRequest> {
        self.shared
            .journal
            .lock()
            .map(|journal| journal.clone())
            .unwrap_or_default()
    }

    /// Stop serving and release the port
    ///
    /// Stopping a server that is not running does nothing.
    pub async fn stop(&mut self) -> Result<(), MockServerError> {
        if self.state != ServerState::Running {
            debug!(port = self.port, state = %self.state, "Mock server not running, nothing to stop");
            return Ok(());
        }

        self.state = ServerState::Stopping;
        self.terminated = true;
        if let Some(token) = self.shutdown.take() {
            token.cancel();
        }

        let result = match self.task.take() {
            Some(mut task) => match tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
                Ok(Ok(Ok(()))) => Ok(()),
                Ok(Ok(Err(e))) => Err(MockServerError::Task(format!("server error: {e}"))),
                Ok(Err(e)) => Err(MockServerError::Task(format!("server task panicked: {e}"))),
                Err(_) => {
                    warn!(port = self.port, "Mock server did not drain in time, aborting");
                    task.abort();
                    Ok(())
                }
            },
            None => Ok(()),
        };

        self.state = ServerState::Stopped;
        info!(port = self.port, "Mock server stopped");
        result
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(token) = self.shutdown.take() {
            token.cancel();
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn handle_request(
    State(shared): State<Arc<Shared>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    let path = uri.path();
    let query = uri.query();
    let stub = shared.respond(&method, path, query, &body);

    let url = match query {
        Some(q) => format!("{path}?{q}"),
        None => path.to_string(),
    };
    debug!(method = %method, url = %url, status = stub.status(), "Mock server request");
    shared.record(RecordedRequest {
        method: method.to_string(),
        url,
        body: String::from_utf8_lossy(&body).into_owned(),
        status: stub.status(),
    });

    match (stub.status_code(), stub.header_map()) {
        (Ok(status), Ok(headers)) => (status, headers, stub.body().to_string()).into_response(),
        (Err(e), _) | (_, Err(e)) => {
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
