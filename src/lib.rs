pub mod assertions;
pub mod error;
pub mod fixtures;
pub mod http_client;
pub mod json_path;
pub mod mock_server;
pub mod port;
pub mod schema;
pub mod stub;
pub mod suite;
pub mod suites;

pub use assertions::{Expectation, Matcher, ValidatableResponse};
pub use error::{AssertionError, CliError, Error, MockServerError, SchemaViolation};
pub use fixtures::FixtureLoader;
pub use http_client::{ApiResponse, HttpClient};
pub use json_path::JsonPath;
pub use mock_server::{MockServer, RecordedRequest, ServerState};
pub use port::{PortAllocator, allocate_port};
pub use schema::{SchemaDraft, SchemaSettings, SchemaValidator};
pub use stub::{RequestMatcher, Stub, StubRegistry, StubResponse};
pub use suite::{Group, Suite, SuiteReport};
