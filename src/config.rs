use crate::cli::{Cli, SuiteName};
use reqwest::header::HeaderMap;
use restcheck::{CliError, Error, FixtureLoader, Group};

use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: Option<Url>,
    pub suites: Vec<SuiteName>,
    pub group: Option<Group>,
    pub fixtures: FixtureLoader,
    pub default_headers: HeaderMap,
    pub log_traffic: bool,
    pub verbose: bool,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self, Error> {
        let base_url = match cli.base_url {
            Some(base_url_str) => Some(
                Url::parse(&base_url_str)
                    .map_err(|e| Error::InvalidUrl(format!("Invalid base URL: {e}")))?,
            ),
            None => None,
        };

        let mut suites = Vec::new();
        if cli.suites.is_empty() {
            suites.extend([SuiteName::Articles, SuiteName::Books, SuiteName::Events]);
        } else {
            for suite in cli.suites {
                if !suites.contains(&suite) {
                    suites.push(suite);
                }
            }
        }

        if base_url.is_none() {
            if let Some(suite) = suites.iter().find(|s| s.needs_service()) {
                return Err(CliError::MissingBaseUrl {
                    suite: format!("{suite:?}").to_lowercase(),
                }
                .into());
            }
        }

        let default_headers = parse_headers(cli.headers)?;

        let fixtures = cli
            .fixtures_dir
            .map(FixtureLoader::new)
            .unwrap_or_default();

        Ok(Config {
            base_url,
            suites,
            group: cli.group,
            fixtures,
            default_headers,
            log_traffic: cli.log_traffic,
            verbose: cli.verbose,
        })
    }
}

/// Parse headers from CLI format "name: value"
fn parse_headers(headers: Vec<String>) -> Result<HeaderMap, CliError> {
    let mut default_headers = HeaderMap::new();
    for header_str in headers {
        let Some((key, value)) = header_str.split_once(':') else {
            return Err(CliError::InvalidHeaderFormat { header: header_str });
        };
        let key = key.trim();
        let value = value.trim();

        if key.is_empty() {
            return Err(CliError::InvalidHeaderFormat { header: header_str });
        }

        let header_name = http::header::HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
            CliError::InvalidHeaderName {
                header: header_str.clone(),
                source: e,
            }
        })?;
        let header_value = http::header::HeaderValue::from_str(value).map_err(|e| {
            CliError::InvalidHeaderValue {
                header: header_str.clone(),
                source: e,
            }
        })?;

        default_headers.insert(header_name, header_value);
    }
    Ok(default_headers)
}
