use restcheck::assertions::{Expectation, equal_to, has_items, verify};
use restcheck::suites::events::{self, EVENT_FIXTURE, EVENTS_URL, EventsEnv};
use restcheck::{
    FixtureLoader, Group, HttpClient, MockServer, PortAllocator, RequestMatcher, StubResponse,
};

mod common;

/// Mock server serving the event fixture, the way the events suite sets it up
async fn event_server() -> anyhow::Result<MockServer> {
    let body = FixtureLoader::default().text(EVENT_FIXTURE).await?;
    let server = MockServer::start_on(0).await?;
    server.register_stub(
        RequestMatcher::get(EVENTS_URL),
        StubResponse::ok()
            .with_header("Content-Type", "application/json")
            .with_body(body),
    )?;
    Ok(server)
}

#[tokio::test]
async fn test_event_document_checks() -> anyhow::Result<()> {
    common::init_tracing();
    let mut server = event_server().await?;
    let client = HttpClient::new(server.base_url()?)?;

    let response = client.get("/events?id=390").await?;
    assert_eq!(response.header("content-type"), Some("application/json"));

    verify(
        &response,
        &[
            Expectation::Status(200),
            Expectation::body("id", equal_to("390")),
            Expectation::body("odd.ck", equal_to(12.2)),
            Expectation::body("odds.price", has_items(["1.30", "5.25", "2.70", "1.20"])),
        ],
    )?;

    // a wrong expectation fails the check
    assert!(
        response
            .then()
            .body("odds.price", has_items(["1.31"]))
            .is_err()
    );

    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_events_suite_runs_every_case() -> anyhow::Result<()> {
    let allocator = PortAllocator::new();
    let report = events::run(&allocator, &EventsEnv::default(), None).await;

    assert!(report.is_success(), "{report}");
    assert_eq!(report.passed(), 6);
    for case in [
        "float_value_matches",
        "status_and_id_match",
        "price_list_has_items",
        "conforms_to_schema",
        "conforms_to_schema_draft4",
        "conforms_to_schema_unchecked",
    ] {
        assert!(report.outcome(case).is_some(), "{case} did not run");
    }
    Ok(())
}

#[tokio::test]
async fn test_write_filter_selects_no_event_case() {
    let allocator = PortAllocator::new();
    let report = events::run(&allocator, &EventsEnv::default(), Some(Group::Write)).await;

    assert!(report.outcomes.is_empty());
    assert!(report.is_success());
}
