use insta::assert_json_snapshot;
use restcheck::{
    HttpClient, MockServer, MockServerError, PortAllocator, RequestMatcher, ServerState,
    StubResponse,
};
use serde_json::json;

mod common;

fn event_stub() -> StubResponse {
    StubResponse::ok().with_json_body(&json!({"id": "390"}))
}

#[tokio::test]
async fn test_registered_stub_is_served_exactly() -> anyhow::Result<()> {
    common::init_tracing();
    let allocator = PortAllocator::new();
    let mut server = MockServer::new(allocator.allocate()?);
    server.register_stub(RequestMatcher::get("/events?id=390"), event_stub())?;
    server.start().await?;

    let client = HttpClient::new(server.base_url()?)?;

    let hit = client.get("/events?id=390").await?;
    assert_eq!(hit.status_code, 200);
    assert_eq!(hit.header("content-type"), Some("application/json"));
    assert_eq!(event_stub().headers().len(), 1);
    assert_eq!(hit.json()?, json!({"id": "390"}));

    // query strings are part of the match
    let other_query = client.get("/events?id=391").await?;
    assert_eq!(other_query.status_code, 404);
    let no_query = client.get("/events").await?;
    assert_eq!(no_query.status_code, 404);

    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_unmatched_request_gets_deterministic_404() -> anyhow::Result<()> {
    let mut server = MockServer::start_on(0).await?;
    let client = HttpClient::new(server.base_url()?)?;

    let response = client.post("/nothing/here?x=1", "{}").await?;
    assert_eq!(response.status_code, 404);
    assert_json_snapshot!(response.json()?, @r#"
    {
      "error": "no stub matched",
      "method": "POST",
      "path": "/nothing/here?x=1"
    }
    "#);

    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_stubs_registered_while_running_are_served() -> anyhow::Result<()> {
    let mut server = MockServer::start_on(0).await?;
    let client = HttpClient::new(server.base_url()?)?;

    assert_eq!(client.get("/late").await?.status_code, 404);
    server.register_stub(
        RequestMatcher::get("/late"),
        StubResponse::new(202).with_body("accepted"),
    )?;
    let response = client.get("/late").await?;
    assert_eq!(response.status_code, 202);
    assert_eq!(response.body, "accepted");

    // same matcher again replaces the earlier stub
    server.register_stub(RequestMatcher::get("/late"), StubResponse::new(204))?;
    assert_eq!(server.stub_count(), 1);
    assert_eq!(client.get("/late").await?.status_code, 204);

    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_received_requests_are_recorded() -> anyhow::Result<()> {
    let mut server = MockServer::start_on(0).await?;
    server.register_stub(
        RequestMatcher::delete("/articles").with_json_body(json!({"article_id": 7})),
        StubResponse::ok(),
    )?;
    let client = HttpClient::new(server.base_url()?)?;

    client
        .delete_json("/articles", &json!({"article_id": 7}))
        .await?;
    client
        .delete_json("/articles", &json!({"article_id": 8}))
        .await?;

    let requests = server.received_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method, "DELETE");
    assert_eq!(requests[0].url, "/articles");
    assert_eq!(requests[0].status, 200);
    assert_eq!(requests[1].body, r#"{"article_id":8}"#);
    assert_eq!(requests[1].status, 404);

    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_servers_get_distinct_ports() -> anyhow::Result<()> {
    let allocator = PortAllocator::new();
    let mut first = MockServer::new(allocator.allocate()?);
    let mut second = MockServer::new(allocator.allocate()?);
    assert_ne!(first.port(), second.port());

    first.start().await?;
    second.start().await?;
    assert!(first.is_running() && second.is_running());

    first.stop().await?;
    second.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_stop_frees_the_port_and_is_idempotent() -> anyhow::Result<()> {
    let mut server = MockServer::start_on(0).await?;
    let port = server.port();
    assert_eq!(server.state(), ServerState::Running);

    server.stop().await?;
    server.stop().await?;
    assert_eq!(server.state(), ServerState::Stopped);

    // the port can be bound again
    let listener = std::net::TcpListener::bind(("127.0.0.1", port))?;
    drop(listener);

    // and the server no longer answers
    let client = HttpClient::new(server.base_url()?)?;
    assert!(client.get("/").await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_bind_conflict_is_a_setup_error() -> anyhow::Result<()> {
    let taken = std::net::TcpListener::bind(("127.0.0.1", 0))?;
    let port = taken.local_addr()?.port();

    let mut server = MockServer::new(port);
    let error = server.start().await.unwrap_err();
    assert!(matches!(error, MockServerError::Bind { port: p, .. } if p == port));
    assert_eq!(server.state(), ServerState::Stopped);

    let error: restcheck::Error = error.into();
    assert!(error.is_setup_failure());
    Ok(())
}

#[tokio::test]
async fn test_invalid_stub_is_rejected() {
    let server = MockServer::new(0);
    let result = server.register_stub(
        RequestMatcher::get("/broken"),
        StubResponse::ok().with_header("Bad Header", "x"),
    );
    assert!(matches!(result, Err(MockServerError::InvalidStub(_))));
    assert_eq!(server.stub_count(), 0);
}
