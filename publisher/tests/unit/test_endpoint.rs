//! Extension endpoint tests, driving the router without a socket

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use nbpublish::deploy::PollOptions;
use nbpublish::errors::PublishError;
use nbpublish::filesys::file::File;
use nbpublish::http::verify::address_hash;
use nbpublish::http::ClientOptions;
use nbpublish::mock::{self, MockServer, Repository, DEFAULT_API_KEY};
use nbpublish::render::{NotebookRenderer, RenderedOutput};
use nbpublish::server::{router, ServerState};
use nbpublish::storage::keys::KeyStore;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::support::write_notebook;

struct FakeRenderer {
    fail: bool,
}

#[async_trait]
impl NotebookRenderer for FakeRenderer {
    async fn render(&self, notebook: &Path, title: &str) -> Result<RenderedOutput, PublishError> {
        if self.fail {
            return Err(PublishError::Render("nbconvert failed: kernel died".to_string()));
        }
        let stem = notebook.file_stem().unwrap().to_string_lossy();
        Ok(RenderedOutput {
            filename: format!("{}.html", stem),
            html: format!("<html><title>{}</title></html>", title).into_bytes(),
        })
    }
}

fn endpoint(notebooks_dir: &Path, fail_render: bool) -> Router {
    let state = ServerState::new(
        notebooks_dir,
        Arc::new(FakeRenderer { fail: fail_render }),
        PollOptions {
            inactivity_timeout: Duration::from_secs(5),
            interval: Duration::from_millis(10),
        },
        ClientOptions::default(),
        KeyStore::new(keys_file(notebooks_dir)),
    );
    router(Arc::new(state))
}

fn keys_file(notebooks_dir: &Path) -> File {
    File::new(notebooks_dir.join(".nbpublish").join("api_keys.json"))
}

async fn post(app: Router, action: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(format!("/nbpublish/{}", action))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn mock_server() -> MockServer {
    mock::start("127.0.0.1:0", Repository::new(""), std::future::pending())
        .await
        .unwrap()
}

fn deploy_body(server: &MockServer, mode: &str) -> Value {
    json!({
        "server_address": server.url.as_str(),
        "api_key": DEFAULT_API_KEY,
        "notebook_title": "Dummy",
        "notebook_name": "dummy",
        "notebook_path": "/dummy.ipynb",
        "app_mode": mode,
    })
}

#[tokio::test]
async fn test_unknown_action_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = post(endpoint(dir.path(), false), "delete_app", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Unknown action: delete_app");
}

#[tokio::test]
async fn test_static_deploy_through_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    write_notebook(dir.path());
    let server = mock_server().await;

    let (status, body) = post(endpoint(dir.path(), false), "deploy", deploy_body(&server, "static")).await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["app_id"], 1);
    let config_url = body["config_url"].as_str().unwrap().to_string();
    let html = reqwest::get(config_url).await.unwrap().text().await.unwrap();
    assert_eq!(html, "<html><title>Dummy</title></html>");
}

#[tokio::test]
async fn test_source_deploy_through_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    write_notebook(dir.path());
    let server = mock_server().await;

    let mut body = deploy_body(&server, "jupyter-static");
    body["environment"] = json!({
        "package_manager": "pip",
        "filename": "requirements.txt",
        "contents": "numpy\npandas\nmatplotlib\n",
        "python": "3.11.4",
        "pip": "23.1.2",
        "locale": "en_US.UTF-8",
    });
    let (status, body) = post(endpoint(dir.path(), false), "deploy", body).await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["app_id"], 1);
}

#[tokio::test]
async fn test_deploy_rejects_bad_requests() {
    let dir = tempfile::tempdir().unwrap();
    write_notebook(dir.path());
    std::fs::write(dir.path().join("notes.txt"), "").unwrap();
    let server = mock_server().await;

    let mut not_notebook = deploy_body(&server, "static");
    not_notebook["notebook_path"] = json!("notes.txt");
    let (status, body) = post(endpoint(dir.path(), false), "deploy", not_notebook).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Not a notebook: notes.txt");

    let (status, body) = post(endpoint(dir.path(), false), "deploy", deploy_body(&server, "shiny")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Invalid app_mode: shiny, must be \"static\" or \"jupyter-static\""
    );

    let (status, body) =
        post(endpoint(dir.path(), false), "deploy", deploy_body(&server, "jupyter-static")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "environment is required for jupyter-static app_mode");

    let mut bad_key = deploy_body(&server, "static");
    bad_key["api_key"] = json!("wrong");
    let (status, body) = post(endpoint(dir.path(), false), "deploy", bad_key).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn test_render_failure_is_server_error() {
    let dir = tempfile::tempdir().unwrap();
    write_notebook(dir.path());
    let server = mock_server().await;

    let (status, body) = post(endpoint(dir.path(), true), "deploy", deploy_body(&server, "static")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().starts_with("Bundle creation failed"));
}

#[tokio::test]
async fn test_verify_search_and_log_actions() {
    let dir = tempfile::tempdir().unwrap();
    write_notebook(dir.path());
    let server = mock_server().await;

    let (status, body) = post(
        endpoint(dir.path(), false),
        "verify_server",
        json!({"server_address": server.url.as_str()}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["server_address"], server.url.as_str());
    assert_eq!(body["address_hash"].as_str().unwrap().len(), 32);

    let (status, _) = post(endpoint(dir.path(), false), "deploy", deploy_body(&server, "static")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(
        endpoint(dir.path(), false),
        "app_search",
        json!({
            "server_address": server.url.as_str(),
            "api_key": DEFAULT_API_KEY,
            "notebook_title": "Dum",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], 1);
    assert_eq!(body[0]["app_mode"], "static");

    let (status, body) = post(
        endpoint(dir.path(), false),
        "get_log",
        json!({
            "server_address": server.url.as_str(),
            "api_key": DEFAULT_API_KEY,
            "task_id": 1,
            "last_status": 1,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["finished"], true);
    assert_eq!(body["status"], json!(["Deploying static content"]));

    let (status, body) = post(
        endpoint(dir.path(), false),
        "app_config",
        json!({
            "server_address": server.url.as_str(),
            "api_key": DEFAULT_API_KEY,
            "app_id": 1,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["config_url"], format!("{}content/apps/1", server.url));
}

#[tokio::test]
async fn test_api_key_is_remembered_per_server() {
    let dir = tempfile::tempdir().unwrap();
    let server_a = "http://connect-a.example:3939/";
    let server_b = "http://connect-b.example:3939/";

    let (status, body) = post(
        endpoint(dir.path(), false),
        "get_api_key",
        json!({"server_address": server_a}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["server_address"], server_a);
    assert!(body["api_key"].is_null());

    let (status, _) = post(
        endpoint(dir.path(), false),
        "set_api_key",
        json!({"server_address": server_a, "api_key": "key-for-a"}),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = post(
        endpoint(dir.path(), false),
        "get_api_key",
        json!({"server_address": server_a}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["api_key"], "key-for-a");

    let (_, body) = post(
        endpoint(dir.path(), false),
        "get_api_key",
        json!({"server_address": server_b}),
    )
    .await;
    assert!(body["api_key"].is_null());

    let stored: serde_json::Map<String, Value> = keys_file(dir.path()).read_json().await.unwrap();
    assert_eq!(stored.get(&address_hash(server_a)), Some(&json!("key-for-a")));
}

#[tokio::test]
async fn test_set_api_key_requires_a_key() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = post(
        endpoint(dir.path(), false),
        "set_api_key",
        json!({"server_address": "http://connect.example:3939/"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
}
