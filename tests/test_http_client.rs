use mockito::{Matcher, Mock};
use reqwest::header::{HeaderMap, HeaderValue};
use restcheck::{Error, HttpClient};
use serde_json::json;

mod common;
use common::mock_backend::MockBackend;

impl MockBackend {
    fn mock_create_article(&mut self) -> Mock {
        self.server
            .mock("POST", "/articles")
            .match_header("content-type", "application/json")
            .match_body(Matcher::JsonString(
                r#"{"title": "Hello", "author": "QA Team"}"#.to_string(),
            ))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"post": {"article_id": 17}}"#)
            .create()
    }

    fn mock_delete_missing_article(&mut self) -> Mock {
        self.server
            .mock("DELETE", "/api/articles")
            .match_body(Matcher::Json(json!({"article_id": 123456})))
            .with_status(500)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": "Unable to find article id: 123456"}"#)
            .create()
    }

    fn mock_authorized_list(&mut self) -> Mock {
        self.server
            .mock("GET", "/books")
            .match_header("authorization", "Bearer token123")
            .match_header("user-agent", Matcher::Regex("^restcheck/".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data": [{"book_id": 1, "title": "Dune"}]}"#)
            .create()
    }
}

#[tokio::test]
async fn test_post_sends_json_body() -> anyhow::Result<()> {
    let mut backend = MockBackend::start().await?;
    let mock = backend.mock_create_article();

    let client = HttpClient::new(backend.base_url())?;
    let response = client
        .post_json("/articles", &json!({"title": "Hello", "author": "QA Team"}))
        .await?;

    mock.assert_async().await;
    assert_eq!(response.status_code, 201);
    assert!(response.is_success);
    assert_eq!(response.string_at("post.article_id")?, "17");
    assert_eq!(response.request_method, "POST");
    Ok(())
}

#[tokio::test]
async fn test_delete_with_body_under_base_path() -> anyhow::Result<()> {
    let mut backend = MockBackend::start().await?;
    let mock = backend.mock_delete_missing_article();

    let base_url = backend.base_url().join("api")?;
    let client = HttpClient::new(base_url)?;
    let response = client
        .delete_json("/articles", &json!({"article_id": 123456}))
        .await?;

    mock.assert_async().await;
    // an error status is an ordinary response, not a client error
    assert_eq!(response.status_code, 500);
    assert!(!response.is_success);
    assert_eq!(response.status_text, "Internal Server Error");
    assert_eq!(
        response.require("error")?,
        json!("Unable to find article id: 123456")
    );
    Ok(())
}

#[tokio::test]
async fn test_default_headers_are_sent() -> anyhow::Result<()> {
    let mut backend = MockBackend::start().await?;
    let mock = backend.mock_authorized_list();

    let mut headers = HeaderMap::new();
    headers.insert("authorization", HeaderValue::from_static("Bearer token123"));
    let client = HttpClient::new(backend.base_url())?
        .with_default_headers(headers)
        .with_logging(true);

    let response = client.get("/books").await?;

    mock.assert_async().await;
    assert_eq!(response.status_code, 200);
    assert_eq!(response.header("Content-Type"), Some("application/json"));
    Ok(())
}

#[tokio::test]
async fn test_connection_refused_is_a_transport_error() -> anyhow::Result<()> {
    let port = restcheck::allocate_port()?;
    let client = HttpClient::new(url::Url::parse(&format!("http://127.0.0.1:{port}"))?)?;

    let error = client.get("/articles").await.unwrap_err();
    assert!(matches!(error, Error::Http(ref message) if message.contains("Connection failed")));
    assert!(!error.is_setup_failure());
    Ok(())
}
