//! Transport client tests against a local axum server

use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use nbpublish::errors::PublishError;
use nbpublish::http::{ConnectApi, ConnectClient};
use secrecy::SecretString;
use tokio::net::TcpListener;
use url::Url;

#[derive(Default)]
struct Seen {
    cookies: Vec<Option<String>>,
    authorization: Vec<Option<String>>,
}

type Shared = Arc<Mutex<Seen>>;

fn header_text(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

async fn me(State(seen): State<Shared>, headers: HeaderMap) -> Response {
    let request_number = {
        let mut seen = seen.lock().unwrap();
        seen.cookies.push(header_text(&headers, header::COOKIE));
        seen.authorization.push(header_text(&headers, header::AUTHORIZATION));
        seen.cookies.len()
    };

    let user = Json(serde_json::json!({"username": "admin"}));
    if request_number == 1 {
        ([(header::SET_COOKIE, "session=abc123; Path=/; HttpOnly")], user).into_response()
    } else {
        user.into_response()
    }
}

async fn conflict() -> Response {
    (
        StatusCode::CONFLICT,
        Json(serde_json::json!({"error": "An object with that name already exists."})),
    )
        .into_response()
}

async fn bad_gateway() -> Response {
    (StatusCode::BAD_GATEWAY, "<html>upstream down</html>").into_response()
}

async fn not_json() -> &'static str {
    "surprise"
}

async fn start() -> (Url, Shared) {
    let seen: Shared = Arc::default();
    let app = Router::new()
        .route("/rsc/__api__/me", get(me))
        .route("/rsc/__api__/applications/1", get(conflict))
        .route("/rsc/__api__/applications/2", get(bad_gateway))
        .route("/rsc/__api__/applications/3", get(not_json))
        .with_state(seen.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (Url::parse(&format!("http://{}/rsc", addr)).unwrap(), seen)
}

fn client(url: &Url) -> ConnectClient {
    ConnectClient::open(url, SecretString::from("secret-key".to_string())).unwrap()
}

#[tokio::test]
async fn test_cookie_is_replaced_and_cleared() {
    let (url, seen) = start().await;
    let mut client = client(&url);

    client.get_current_user().await.unwrap();
    assert_eq!(client.cookie().unwrap(), "session=abc123");

    client.get_current_user().await.unwrap();
    assert!(client.cookie().is_none());

    client.get_current_user().await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(
        seen.cookies,
        vec![None, Some("session=abc123".to_string()), None]
    );
    assert!(seen
        .authorization
        .iter()
        .all(|auth| auth.as_deref() == Some("Key secret-key")));
}

#[tokio::test]
async fn test_error_kinds() {
    let (url, _) = start().await;
    let mut client = client(&url);

    let err = client.get_application(1).await.unwrap_err();
    assert!(matches!(err, PublishError::Application(ref m) if m == "An object with that name already exists."));

    let err = client.get_application(2).await.unwrap_err();
    assert!(matches!(err, PublishError::Transport(ref m) if m == "Unexpected response code: 502"));

    let err = client.get_application(3).await.unwrap_err();
    assert!(matches!(err, PublishError::Transport(_)));

    let err = client.get_application(4).await.unwrap_err();
    assert!(matches!(err, PublishError::Transport(_)), "{}", err);
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = Url::parse(&format!("http://{}/", addr)).unwrap();
    let err = client(&url).get_current_user().await.unwrap_err();
    assert!(matches!(err, PublishError::Transport(_)));
}
