mod cli;
mod config;

use cli::{Cli, SuiteName};
use config::Config;
use restcheck::suites::{self, ServiceContext, events::EventsEnv};
use restcheck::{Error, HttpClient, PortAllocator, SuiteReport};
use std::process;
use tracing::{Instrument, error, info, info_span};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            error!(error = %e, "restcheck failed");
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

/// Run the selected suites, returning whether every case passed
async fn run() -> Result<bool, Error> {
    let cli = Cli::parse_args();
    setup_logging(cli.verbose);
    let config = Config::from_cli(cli)?;

    info!(
        suites = ?config.suites,
        group = ?config.group,
        base_url = config.base_url.as_ref().map(|u| u.as_str()),
        fixtures = %config.fixtures.root().display(),
        "Starting restcheck"
    );

    let allocator = PortAllocator::new();
    let mut reports = Vec::with_capacity(config.suites.len());
    for suite in &config.suites {
        let span = info_span!("suite", name = ?suite);
        let report = run_suite(*suite, &config, &allocator)
            .instrument(span)
            .await?;
        reports.push(report);
    }

    let mut all_passed = true;
    for report in &reports {
        println!("{report}");
        all_passed &= report.is_success();
    }

    let passed: usize = reports.iter().map(SuiteReport::passed).sum();
    let failed: usize = reports.iter().map(SuiteReport::failed).sum();
    info!(passed, failed, all_passed, "Finished");
    Ok(all_passed)
}

async fn run_suite(
    suite: SuiteName,
    config: &Config,
    allocator: &PortAllocator,
) -> Result<SuiteReport, Error> {
    let report = match suite {
        SuiteName::Articles => {
            let context = service_context(suite, config)?;
            suites::articles::suite().run(&context, config.group).await
        }
        SuiteName::Books => {
            let context = service_context(suite, config)?;
            suites::books::suite().run(&context, config.group).await
        }
        SuiteName::Events => {
            let env = EventsEnv {
                fixtures: config.fixtures.clone(),
                log_traffic: config.log_traffic,
            };
            suites::events::run(allocator, &env, config.group).await
        }
    };
    Ok(report)
}

fn service_context(suite: SuiteName, config: &Config) -> Result<ServiceContext, Error> {
    let base_url = config
        .base_url
        .clone()
        .ok_or_else(|| Error::Config(format!("no base URL for suite {suite:?}")))?;
    let client = HttpClient::new(base_url)?
        .with_default_headers(config.default_headers.clone())
        .with_logging(config.log_traffic);
    Ok(ServiceContext::new(client, config.fixtures.clone()))
}

fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_env("RESTCHECK_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
