use restcheck::suites::articles::ARTICLES;
use restcheck::suites::books::BOOKS;
use restcheck::suites::{Resource, ServiceContext};
use restcheck::{FixtureLoader, HttpClient, MockServer, RequestMatcher, StubResponse};
use serde_json::{Value, json};

/// Id the emulated service hands out on create
pub const CREATED_ID: u64 = 42;

/// Stub the observed behaviour of the CRUD service for one resource
pub fn stub_resource(server: &MockServer, resource: &Resource, titles: &[&str]) -> anyhow::Result<()> {
    let id_field = resource.id_field;
    let data: Vec<Value> = titles
        .iter()
        .enumerate()
        .map(|(i, title)| json!({ id_field: i + 1, "title": title }))
        .collect();

    server.register_stub(
        RequestMatcher::get(resource.collection),
        StubResponse::ok().with_json_body(&json!({ "data": data })),
    )?;
    server.register_stub(
        RequestMatcher::post(resource.collection),
        StubResponse::new(201).with_json_body(&json!({ "post": { id_field: CREATED_ID } })),
    )?;
    server.register_stub(
        RequestMatcher::delete(resource.collection)
            .with_body(resource.delete_body(&CREATED_ID.to_string())),
        StubResponse::ok().with_json_body(&json!({ "message": resource.deleted_message() })),
    )?;
    server.register_stub(
        RequestMatcher::delete(resource.collection)
            .with_body(resource.delete_body(resource.missing_id)),
        StubResponse::new(500)
            .with_json_body(&json!({ "error": resource.not_found_error(resource.missing_id) })),
    )?;
    Ok(())
}

/// Mock server emulating both collections of the service
pub async fn start_emulated_service() -> anyhow::Result<MockServer> {
    let server = MockServer::start_on(0).await?;
    stub_resource(&server, &ARTICLES, &["Testing from the outside", "Contracts"])?;
    stub_resource(&server, &BOOKS, &["The Pragmatic Tester", "Black-box Basics"])?;
    Ok(server)
}

pub fn service_context(server: &MockServer) -> anyhow::Result<ServiceContext> {
    let client = HttpClient::new(server.base_url()?)?;
    Ok(ServiceContext::new(client, FixtureLoader::default()))
}
