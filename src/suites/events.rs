//! Checks of the event document served by a suite-scoped mock server.

use tracing::debug;

use crate::assertions::{equal_to, has_items};
use crate::error::Error;
use crate::fixtures::FixtureLoader;
use crate::http_client::{ApiResponse, HttpClient};
use crate::mock_server::MockServer;
use crate::port::PortAllocator;
use crate::schema::{SchemaDraft, SchemaSettings};
use crate::stub::{RequestMatcher, StubResponse};
use crate::suite::{BoxFuture, Group, Suite, SuiteReport, run_scoped};

pub const EVENTS_URL: &str = "/events?id=390";
pub const EVENT_FIXTURE: &str = "evento.json";
pub const EVENT_SCHEMA: &str = "eventoSchema.json";

/// Context of the events suite, built once the mock server is up
#[derive(Debug, Clone)]
pub struct EventsContext {
    pub client: HttpClient,
    pub fixtures: FixtureLoader,
}

/// What the events suite needs from its caller
#[derive(Debug, Clone, Default)]
pub struct EventsEnv {
    pub fixtures: FixtureLoader,
    pub log_traffic: bool,
}

impl EventsContext {
    async fn fetch_event(&self) -> Result<ApiResponse, Error> {
        self.client.get(EVENTS_URL).await
    }

    async fn check_schema(&self, settings: SchemaSettings) -> Result<(), Error> {
        let validator = self.fixtures.schema(EVENT_SCHEMA, settings).await?;
        self.fetch_event().await?.then().matches_schema(&validator)?;
        Ok(())
    }
}

pub fn suite() -> Suite<EventsContext> {
    Suite::new("events")
        .case("float_value_matches", Group::Read, float_value_matches)
        .case("status_and_id_match", Group::Read, status_and_id_match)
        .case("price_list_has_items", Group::Read, price_list_has_items)
        .case("conforms_to_schema", Group::Read, conforms_to_schema)
        .case("conforms_to_schema_draft4", Group::Read, conforms_to_schema_draft4)
        .case(
            "conforms_to_schema_unchecked",
            Group::Read,
            conforms_to_schema_unchecked,
        )
}

/// Register the event stub and point a client at the server
pub fn setup<'a>(
    server: &'a MockServer,
    env: &'a EventsEnv,
) -> BoxFuture<'a, Result<EventsContext, Error>> {
    Box::pin(async move {
        let body = env.fixtures.text(EVENT_FIXTURE).await?;
        server.register_stub(
            RequestMatcher::get(EVENTS_URL),
            StubResponse::ok()
                .with_header("Content-Type", mime::APPLICATION_JSON.as_ref())
                .with_body(body),
        )?;
        debug!(port = server.port(), url = EVENTS_URL, "Event stub registered");

        let client = HttpClient::new(server.base_url()?)?.with_logging(env.log_traffic);
        Ok(EventsContext {
            client,
            fixtures: env.fixtures.clone(),
        })
    })
}

/// Run the events suite on a fresh mock server
pub async fn run(allocator: &PortAllocator, env: &EventsEnv, filter: Option<Group>) -> SuiteReport {
    run_scoped(&suite(), allocator, env, setup, filter).await
}

fn float_value_matches(ctx: &EventsContext) -> BoxFuture<'_, Result<(), Error>> {
    Box::pin(async move {
        ctx.fetch_event()
            .await?
            .then()
            .body("odd.ck", equal_to(12.2_f32))?;
        Ok(())
    })
}

fn status_and_id_match(ctx: &EventsContext) -> BoxFuture<'_, Result<(), Error>> {
    Box::pin(async move {
        ctx.fetch_event()
            .await?
            .then()
            .status(200)?
            .body("id", equal_to("390"))?;
        Ok(())
    })
}

fn price_list_has_items(ctx: &EventsContext) -> BoxFuture<'_, Result<(), Error>> {
    Box::pin(async move {
        ctx.fetch_event()
            .await?
            .then()
            .body("odds.price", has_items(["1.30", "5.25", "2.70", "1.20"]))?;
        Ok(())
    })
}

fn conforms_to_schema(ctx: &EventsContext) -> BoxFuture<'_, Result<(), Error>> {
    Box::pin(ctx.check_schema(SchemaSettings::default()))
}

fn conforms_to_schema_draft4(ctx: &EventsContext) -> BoxFuture<'_, Result<(), Error>> {
    Box::pin(ctx.check_schema(SchemaSettings::default().with_draft(SchemaDraft::Draft4)))
}

fn conforms_to_schema_unchecked(ctx: &EventsContext) -> BoxFuture<'_, Result<(), Error>> {
    Box::pin(ctx.check_schema(SchemaSettings::default().with_checked_validation(false)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_fixture_aborts_before_any_case() {
        let allocator = PortAllocator::new();
        let env = EventsEnv {
            fixtures: FixtureLoader::new("/nonexistent/fixtures"),
            log_traffic: false,
        };
        let report = run(&allocator, &env, None).await;

        assert!(report.outcomes.is_empty());
        assert!(report.setup_failure.is_some());
        assert!(!report.is_success());

        // the suite's port went back to the allocator
        assert_eq!(allocator.issued_count(), 0);
    }
}
