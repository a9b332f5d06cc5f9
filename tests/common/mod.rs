#[allow(dead_code)]
pub mod mock_backend;
#[allow(dead_code)]
pub mod service_contract;

use std::env;

use url::Url;

/// Base URL of a live service to run the service suites against
///
/// Unset (or unparsable) means the suites run against a mock server emulating
/// the service contract.
#[allow(dead_code)]
pub fn live_base_url() -> Option<Url> {
    env::var("RESTCHECK_LIVE_BASE_URL")
        .ok()
        .filter(|value| !value.is_empty())
        .and_then(|value| Url::parse(&value).ok())
}

/// Install a test subscriber once, honouring RESTCHECK_LOG
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("RESTCHECK_LOG")
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}
