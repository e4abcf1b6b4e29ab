//! Browsing server routes, driven through the router without a socket.

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use litemodel::browse::BrowseServer;
use litemodel::config::{ResponseFormat, ServerConfig};
use litemodel::prelude::*;
use serde_json::{Value as Json, json};
use std::path::{Path, PathBuf};
use tower::ServiceExt;

async fn seed(dir: &Path) -> ModelResult<PathBuf> {
    let schema = DbSchema::new("reviews.db").with_table(
        TableSchema::new("reviews")
            .field("rid", "int")
            .field("header", "text")
            .field("rating", "int")
            .primary_key("rid")
            .default_table(),
    );
    let mut model = ModelOptions::new().location(dir).open(schema).await?;
    model
        .write(&Record::new().set("rid", 1).set("header", "good").set("rating", 5))
        .await?;
    model
        .write(&Record::new().set("rid", 2).set("header", "<b>meh</b>").set("rating", 2))
        .await?;
    model
        .write(&Record::new().set("rid", 3).set("header", "fine").set("rating", 4))
        .await?;
    model.close().await?;
    Ok(model.path().to_path_buf())
}

async fn router(dir: &Path, format: ResponseFormat) -> Router {
    let path = seed(dir).await.unwrap();
    let config = ServerConfig {
        format,
        ..ServerConfig::default()
    };
    BrowseServer::open(&path, config).await.unwrap().router()
}

async fn get(router: Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let response = router
        .oneshot(
            Request::builder()
                .uri(uri)
                .header(header::ORIGIN, "http://example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let cors = response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .map(|v| v.to_str().unwrap().to_string());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, cors, String::from_utf8(body.to_vec()).unwrap())
}

fn parse(body: &str) -> Json {
    serde_json::from_str(body).unwrap()
}

#[tokio::test]
async fn test_welcome() {
    let dir = tempfile::tempdir().unwrap();
    let (status, cors, body) = get(router(dir.path(), ResponseFormat::Json).await, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cors.as_deref(), Some("*"));
    assert_eq!(
        parse(&body),
        json!({"message": "Welcome to litemodel", "status": 200})
    );
}

#[tokio::test]
async fn test_list_tables() {
    let dir = tempfile::tempdir().unwrap();
    let (status, _, body) = get(router(dir.path(), ResponseFormat::Json).await, "/tables").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse(&body), json!({"tables": ["reviews"], "count": 1}));
}

#[tokio::test]
async fn test_table_rows_json() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(dir.path(), ResponseFormat::Json).await;

    let (status, _, body) = get(app.clone(), "/tables/reviews").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        parse(&body),
        json!({
            "table": "reviews",
            "columns": ["rid", "header", "rating"],
            "rows": [[1, "good", 5], [2, "<b>meh</b>", 2], [3, "fine", 4]],
            "count": 3
        })
    );

    let (_, _, body) = get(app.clone(), "/tables/reviews?limit=1").await;
    assert_eq!(parse(&body)["rows"], json!([[1, "good", 5]]));

    let (_, _, body) = get(app, "/tables/reviews?where=rating%3E%3D4").await;
    assert_eq!(parse(&body)["count"], json!(2));
}

#[tokio::test]
async fn test_errors() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(dir.path(), ResponseFormat::Json).await;

    let (status, cors, body) = get(app.clone(), "/reviews").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(cors.as_deref(), Some("*"));
    assert_eq!(parse(&body)["error"], json!("/tables/ is missing from path"));

    let (status, _, body) = get(app.clone(), "/tables/nope").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse(&body)["error"], json!("Schema error: unknown table 'nope'"));

    let (status, _, body) = get(app.clone(), "/tables/reviews?where=stars%3D1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse(&body)["code"], json!("SCHEMA_ERROR"));

    let (status, _, body) = get(app.clone(), "/tables/reviews?where=%3D%3D").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse(&body)["code"], json!("PARSE_ERROR"));

    let (status, cors, body) = get(app, "/tables/reviews?limit=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(cors.as_deref(), Some("*"));
    let body = parse(&body);
    assert_eq!(body["code"], json!("QUERY_ERROR"));
    assert!(body["error"].as_str().unwrap().contains("limit"), "{}", body);
}

#[tokio::test]
async fn test_table_rows_html() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(dir.path(), ResponseFormat::Html).await;

    let (status, _, body) = get(app.clone(), "/tables/reviews").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<tr><th>rid</th><th>header</th><th>rating</th></tr>"));
    assert!(body.contains("<td>&lt;b&gt;meh&lt;/b&gt;</td>"));
    assert!(!body.contains("<b>meh</b>"));

    let (status, _, body) = get(app.clone(), "/nowhere").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("/tables/ is missing from path"));

    let (status, _, body) = get(app, "/tables/reviews?limit=-1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.starts_with("<!DOCTYPE html>"));
    assert!(body.contains("<h1>400</h1>"));
}

#[tokio::test]
async fn test_missing_database() {
    let dir = tempfile::tempdir().unwrap();
    let result = BrowseServer::open(dir.path().join("none.db"), ServerConfig::default()).await;
    assert!(result.is_err());
}
