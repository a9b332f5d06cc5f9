//! Sequential suite runner.
//!
//! A [`Suite`] is an ordered list of named cases sharing one context object. A
//! failing case is recorded in the [`SuiteReport`] and the next case runs.
//! [`run_scoped`] wraps a suite in a mock server that is started
//! before the first case and stopped after the last one, whatever the outcome.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::str::FromStr;

use futures::FutureExt;
use tracing::{Instrument, error, info, info_span, warn};

use crate::error::Error;
use crate::mock_server::MockServer;
use crate::port::PortAllocator;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Body of a case
pub type CaseFn<C> = for<'a> fn(&'a C) -> BoxFuture<'a, Result<(), Error>>;

/// Builds a suite context around a started mock server
pub type SetupFn<C, E> = for<'a> fn(&'a MockServer, &'a E) -> BoxFuture<'a, Result<C, Error>>;

/// Case groups, used to select a subset of a suite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    /// Only reads from the service
    Read,
    /// Creates or deletes data
    Write,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Group::Read => f.write_str("read"),
            Group::Write => f.write_str("write"),
        }
    }
}

impl FromStr for Group {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "read" | "get" => Ok(Group::Read),
            "write" | "post" => Ok(Group::Write),
            other => Err(Error::Config(format!(
                "unknown group '{other}', expected 'read' or 'write'"
            ))),
        }
    }
}

pub struct Case<C> {
    pub name: &'static str,
    pub group: Group,
    pub run: CaseFn<C>,
}

pub struct Suite<C> {
    name: &'static str,
    cases: Vec<Case<C>>,
}

impl<C: Sync> Suite<C> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            cases: Vec::new(),
        }
    }

    #[must_use]
    pub fn case(mut self, name: &'static str, group: Group, run: CaseFn<C>) -> Self {
        self.cases.push(Case { name, group, run });
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn case_names(&self) -> Vec<&'static str> {
        self.cases.iter().map(|c| c.name).collect()
    }

    /// Run every case (or the ones in `filter`) in declaration order
    pub async fn run(&self, context: &C, filter: Option<Group>) -> SuiteReport {
        let mut report = SuiteReport::new(self.name);
        info!(suite = self.name, "Running suite");

        for case in &self.cases {
            if filter.is_some_and(|g| g != case.group) {
                continue;
            }

            let span = info_span!("case", suite = self.name, case = case.name);
            let result = match AssertUnwindSafe((case.run)(context).instrument(span))
                .catch_unwind()
                .await
            {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(payload) => Err(format!("panicked: {}", panic_message(payload.as_ref()))),
            };
            match &result {
                Ok(()) => info!(suite = self.name, case = case.name, "PASSED"),
                Err(e) => warn!(suite = self.name, case = case.name, error = %e, "FAILED"),
            }
            report.outcomes.push(CaseOutcome {
                case: case.name,
                group: case.group,
                failure: result.err(),
            });
        }

        report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// Result of one case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseOutcome {
    pub case: &'static str,
    pub group: Group,
    pub failure: Option<String>,
}

impl CaseOutcome {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Outcomes of one suite run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteReport {
    pub suite: &'static str,
    /// Set when the suite was aborted before any case ran
    pub setup_failure: Option<String>,
    pub outcomes: Vec<CaseOutcome>,
}

impl SuiteReport {
    pub fn new(suite: &'static str) -> Self {
        Self {
            suite,
            setup_failure: None,
            outcomes: Vec::new(),
        }
    }

    pub fn setup_failed(suite: &'static str, error: &Error) -> Self {
        error!(suite, error = %error, "Suite setup failed, no case ran");
        Self {
            suite,
            setup_failure: Some(error.to_string()),
            outcomes: Vec::new(),
        }
    }

    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    pub fn is_success(&self) -> bool {
        self.setup_failure.is_none() && self.failed() == 0
    }

    pub fn outcome(&self, case: &str) -> Option<&CaseOutcome> {
        self.outcomes.iter().find(|o| o.case == case)
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(failure) = &self.setup_failure {
            return write!(f, "{}: setup failed: {failure}", self.suite);
        }
        writeln!(
            f,
            "{}: {} passed, {} failed",
            self.suite,
            self.passed(),
            self.failed()
        )?;
        for outcome in &self.outcomes {
            match &outcome.failure {
                None => writeln!(f, "  ok    {} [{}]", outcome.case, outcome.group)?,
                Some(reason) => {
                    writeln!(f, "  FAIL  {} [{}]: {reason}", outcome.case, outcome.group)?
                }
            }
        }
        Ok(())
    }
}

/// A port issued by a [`PortAllocator`], released when dropped
struct PortLease<'a> {
    allocator: &'a PortAllocator,
    port: u16,
}

impl<'a> PortLease<'a> {
    fn acquire(allocator: &'a PortAllocator) -> Result<Self, Error> {
        let port = allocator.allocate()?;
        Ok(Self { allocator, port })
    }
}

impl Drop for PortLease<'_> {
    fn drop(&mut self) {
        self.allocator.release(self.port);
    }
}

/// Run `suite` against a mock server that lives exactly as long as the suite
///
/// A port is taken from `allocator`, the server is started and `setup` builds
/// the context (typically registering stubs). Any failure up to that point
/// aborts the suite. Once cases have run the server is stopped and the port
/// released, whether the cases passed or not.
pub async fn run_scoped<C, E>(
    suite: &Suite<C>,
    allocator: &PortAllocator,
    env: &E,
    setup: SetupFn<C, E>,
    filter: Option<Group>,
) -> SuiteReport
where
    C: Sync,
    E: Sync,
{
    let lease = match PortLease::acquire(allocator) {
        Ok(lease) => lease,
        Err(e) => return SuiteReport::setup_failed(suite.name(), &e),
    };

    let mut server = MockServer::new(lease.port);
    if let Err(e) = server.start().await {
        return SuiteReport::setup_failed(suite.name(), &e.into());
    }
    info!(suite = suite.name(), url = %server.url(), "Mock server ready");

    let report = match setup(&server, env).await {
        Ok(context) => suite.run(&context, filter).await,
        Err(e) => SuiteReport::setup_failed(suite.name(), &e),
    };

    if let Err(e) = server.stop().await {
        warn!(suite = suite.name(), error = %e, "Mock server did not stop cleanly");
    }
    drop(lease);
    report
}
