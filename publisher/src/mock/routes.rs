//! HTTP routes of the mock publishing server

use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::get,
    routing::post,
    Extension, Json, Router,
};
use connect_models::{
    AppId, ApplicationUpdate, CreateApplication, DeployBundle, ErrorBody, TaskId, User,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::mock::repository::{RepoError, Repository};

/// Largest accepted bundle upload
pub const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Shared repository
pub type MockState = Arc<Mutex<Repository>>;

impl IntoResponse for RepoError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

/// Build the mock server router
pub fn router(state: MockState) -> Router {
    let api = Router::new()
        .route("/__api__/me", get(me_handler))
        .route(
            "/__api__/applications",
            get(list_apps_handler).post(create_app_handler),
        )
        .route(
            "/__api__/applications/{id}",
            get(get_app_handler).post(update_app_handler),
        )
        .route("/__api__/applications/{id}/config", get(config_handler))
        .route("/__api__/applications/{id}/upload", post(upload_handler))
        .route("/__api__/applications/{id}/deploy", post(deploy_handler))
        .route("/__api__/tasks/{id}", get(task_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/", get(index_handler))
        .route("/__api__/server_settings", get(settings_handler))
        .route("/content/apps/{id}", get(content_handler))
        .merge(api)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

fn lock(state: &MockState) -> MutexGuard<'_, Repository> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, RepoError> {
    serde_json::from_slice(body)
        .map_err(|e| RepoError::new(StatusCode::BAD_REQUEST, format!("invalid request body: {}", e)))
}

/// Resolve `Authorization: Key <api key>` to a user
async fn require_api_key(State(state): State<MockState>, mut request: Request, next: Next) -> Response {
    let user = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Key "))
        .and_then(|key| lock(&state).authenticate(key.trim()));

    match user {
        Some(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        None => RepoError::new(StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
    }
}

async fn index_handler() -> Html<&'static str> {
    Html("<html><body>Welcome to the mock publishing server.</body></html>")
}

async fn settings_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "version": "mock",
        "authentication": {"handles_credentials": true},
    }))
}

async fn me_handler(Extension(user): Extension<User>) -> Json<User> {
    Json(user)
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    search: Option<String>,
    count: Option<usize>,
}

async fn list_apps_handler(State(state): State<MockState>, Query(query): Query<ListQuery>) -> impl IntoResponse {
    let list = lock(&state).find_applications(query.search.as_deref(), query.count.unwrap_or(100));
    Json(list)
}

async fn create_app_handler(
    State(state): State<MockState>,
    Extension(user): Extension<User>,
    body: Bytes,
) -> Result<impl IntoResponse, RepoError> {
    let create: CreateApplication = parse_body(&body)?;
    let app = lock(&state).create_application(&create.name, create.title, &user)?;
    debug!("Created application {} ({})", app.id, app.name);
    Ok(Json(app))
}

async fn get_app_handler(State(state): State<MockState>, Path(id): Path<AppId>) -> Result<impl IntoResponse, RepoError> {
    Ok(Json(lock(&state).get_application(id)?))
}

async fn update_app_handler(
    State(state): State<MockState>,
    Path(id): Path<AppId>,
    body: Bytes,
) -> Result<impl IntoResponse, RepoError> {
    let updates: ApplicationUpdate = parse_body(&body)?;
    Ok(Json(lock(&state).update_application(id, &updates)?))
}

async fn config_handler(State(state): State<MockState>, Path(id): Path<AppId>) -> Result<impl IntoResponse, RepoError> {
    Ok(Json(lock(&state).config(id)?))
}

async fn upload_handler(
    State(state): State<MockState>,
    Path(id): Path<AppId>,
    body: Bytes,
) -> Result<impl IntoResponse, RepoError> {
    let record = lock(&state).upload(id, body.to_vec())?;
    debug!("Stored bundle {} ({} bytes) for application {}", record.id, body.len(), id);
    Ok(Json(record))
}

async fn deploy_handler(
    State(state): State<MockState>,
    Path(id): Path<AppId>,
    body: Bytes,
) -> Result<impl IntoResponse, RepoError> {
    let deploy: DeployBundle = if body.is_empty() {
        DeployBundle { bundle: None }
    } else {
        parse_body(&body)?
    };
    Ok(Json(lock(&state).deploy(id, deploy.bundle)?))
}

#[derive(Debug, Deserialize)]
struct TaskQuery {
    first_status: Option<u64>,
}

async fn task_handler(
    State(state): State<MockState>,
    Path(id): Path<String>,
    Query(query): Query<TaskQuery>,
) -> Result<impl IntoResponse, RepoError> {
    let task = lock(&state).get_task(&TaskId(id), query.first_status)?;
    Ok(Json(task))
}

async fn content_handler(State(state): State<MockState>, Path(id): Path<AppId>) -> Result<Response, RepoError> {
    let html = lock(&state).content(id)?;
    Ok(([(header::CONTENT_TYPE, "text/html; charset=utf-8")], html).into_response())
}
