use clap::{Parser, ValueEnum};
use restcheck::Group;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuiteName {
    Articles,
    Books,
    Events,
}

impl SuiteName {
    /// Whether the suite talks to the external service rather than a mock server
    pub fn needs_service(self) -> bool {
        matches!(self, SuiteName::Articles | SuiteName::Books)
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "restcheck")]
#[command(about = "Black-box API checks for CRUD services, plus a mock-server backed event suite")]
pub struct Cli {
    /// Base URL of the service under test
    #[arg(long, env = "RESTCHECK_BASE_URL")]
    pub base_url: Option<String>,

    /// Suites to run (all of them when omitted)
    #[arg(long = "suite", value_enum, action = clap::ArgAction::Append)]
    pub suites: Vec<SuiteName>,

    /// Only run cases of this group ("read" or "write")
    #[arg(long)]
    pub group: Option<Group>,

    /// Directory holding request bodies and schema documents
    #[arg(long, env = "RESTCHECK_FIXTURES_DIR")]
    pub fixtures_dir: Option<String>,

    /// HTTP headers to add to all requests (format: "name: value")
    #[arg(long = "header", action = clap::ArgAction::Append, help = "HTTP headers to add to all requests in 'name: value' format (can be used multiple times)")]
    pub headers: Vec<String>,

    /// Log every request and response
    #[arg(long)]
    pub log_traffic: bool,

    /// Enable verbose logging
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
