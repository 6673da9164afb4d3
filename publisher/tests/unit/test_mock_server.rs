//! End-to-end deploys against the mock publishing server

use std::time::Duration;

use connect_models::AppMode;
use nbpublish::bundle::{make_source_bundle, make_static_bundle};
use nbpublish::deploy::{self, DeployRequest, Deployer, PollOptions};
use nbpublish::errors::PublishError;
use nbpublish::http::verify::verify_server;
use nbpublish::http::{ClientOptions, ConnectApi, ConnectClient};
use nbpublish::mock::{self, MockServer, Repository, TaskScript, DEFAULT_API_KEY};
use secrecy::SecretString;

use crate::support::{pip_environment, write_notebook};

fn publish_count(server: &MockServer, app_id: u64) -> u32 {
    server.state.lock().unwrap().publish_count(app_id)
}

async fn start(script: TaskScript) -> MockServer {
    mock::start(
        "127.0.0.1:0",
        Repository::new("").with_task_script(script),
        std::future::pending(),
    )
    .await
    .unwrap()
}

fn api_key() -> SecretString {
    SecretString::from(DEFAULT_API_KEY.to_string())
}

fn fast_deployer() -> Deployer {
    Deployer::new(PollOptions {
        inactivity_timeout: Duration::from_millis(300),
        interval: Duration::from_millis(10),
    })
}

fn static_request(app_id: Option<u64>) -> DeployRequest {
    DeployRequest {
        app_id,
        name: "dummy".to_string(),
        title: "Dummy".to_string(),
        bundle: make_static_bundle("dummy.html", b"<html><body>dummy</body></html>").unwrap(),
    }
}

#[tokio::test]
async fn test_static_deploy_end_to_end() {
    let server = start(TaskScript {
        polls_before_finish: Some(2),
        exit_code: 0,
    })
    .await;

    let outcome = deploy::deploy(
        &server.url,
        api_key(),
        &ClientOptions::default(),
        &fast_deployer(),
        static_request(None),
    )
    .await
    .unwrap();

    assert_eq!(outcome.app_id, 1);
    assert_eq!(
        outcome.config_url,
        format!("{}content/apps/1", server.url)
    );
    assert_eq!(outcome.task_log.first().map(String::as_str), Some("Building static content"));
    assert_eq!(outcome.task_log.last().map(String::as_str), Some("Deploying static content"));
    assert_eq!(outcome.task_log.len(), 4);

    let mut client = ConnectClient::open(&server.url, api_key()).unwrap();
    let app = client.get_application(1).await.unwrap();
    assert_eq!(app.title, "Dummy");
    assert_eq!(app.mode(), Some(AppMode::Static));
    assert_eq!(app.access_type.as_deref(), Some("acl"));
    assert!(!app.needs_config);

    let html = reqwest::get(outcome.config_url).await.unwrap().text().await.unwrap();
    assert_eq!(html, "<html><body>dummy</body></html>");
}

#[tokio::test]
async fn test_mode_cannot_change_after_first_deploy() {
    let server = start(TaskScript::default()).await;
    let deployer = fast_deployer();

    let first = deploy::deploy(&server.url, api_key(), &ClientOptions::default(), &deployer, static_request(None))
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let notebook = write_notebook(dir.path());
    let bundle = make_source_bundle("dummy.ipynb", &notebook, &pip_environment(), &[], dir.path()).unwrap();

    let err = deploy::deploy(
        &server.url,
        api_key(),
        &ClientOptions::default(),
        &deployer,
        DeployRequest {
            app_id: Some(first.app_id),
            name: "dummy".to_string(),
            title: "Dummy".to_string(),
            bundle,
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PublishError::Application(ref m) if m == "Cannot change app mode once deployed"));
    assert_eq!(publish_count(&server, first.app_id), 1);
    assert_eq!(
        server.state.lock().unwrap().app_mode(first.app_id),
        Some(AppMode::Static)
    );

    // Redeploying in the original mode is still accepted
    deploy::deploy(
        &server.url,
        api_key(),
        &ClientOptions::default(),
        &deployer,
        static_request(Some(first.app_id)),
    )
    .await
    .unwrap();
    assert_eq!(publish_count(&server, first.app_id), 2);
}

#[tokio::test]
async fn test_failed_task_reports_deploy_failure() {
    let server = start(TaskScript {
        polls_before_finish: Some(0),
        exit_code: 1,
    })
    .await;

    let err = deploy::deploy(&server.url, api_key(), &ClientOptions::default(), &fast_deployer(), static_request(None))
        .await
        .unwrap_err();

    assert!(matches!(err, PublishError::DeployFailed(_)), "{}", err);
    assert_eq!(publish_count(&server, 1), 0);
}

#[tokio::test]
async fn test_stalled_task_times_out() {
    let server = start(TaskScript {
        polls_before_finish: None,
        exit_code: 0,
    })
    .await;

    let err = deploy::deploy(&server.url, api_key(), &ClientOptions::default(), &fast_deployer(), static_request(None))
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "{}", err);
    assert_eq!(publish_count(&server, 1), 0);
}

#[tokio::test]
async fn test_server_errors_are_application_errors() {
    let server = start(TaskScript::default()).await;
    let mut client = ConnectClient::open(&server.url, api_key()).unwrap();

    client.create_application("dummy").await.unwrap();
    let err = client.create_application("dummy").await.unwrap_err();
    assert_eq!(err.to_string(), "An object with that name already exists.");

    let err = client.get_application(42).await.unwrap_err();
    assert_eq!(err.to_string(), "Not found");

    let err = client.trigger_deploy(1, 42).await.unwrap_err();
    assert_eq!(err.to_string(), "bundle 42 not found");

    let mut stranger = ConnectClient::open(&server.url, SecretString::from("wrong".to_string())).unwrap();
    let err = stranger.get_current_user().await.unwrap_err();
    assert!(err.is_application());
}

#[tokio::test]
async fn test_verify_server_reports_canonical_address() {
    let server = start(TaskScript::default()).await;

    let canonical = verify_server(server.url.as_str()).await.unwrap();
    assert_eq!(canonical.as_deref(), Some(server.url.as_str()));

    let not_a_server = format!("{}content/apps/", server.url);
    assert_eq!(verify_server(&not_a_server).await.unwrap(), None);
}
