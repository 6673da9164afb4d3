//! HTTP request handlers
//!
//! Server side failures (transport, application, timeout) answer 400 with
//! the error message; a bundle that cannot be built answers 500.

use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path as UrlPath, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use connect_models::{AppMode, TaskId};
use endpoint_models::{
    ApiKeyResponse, AppConfigRequest, AppGetRequest, AppSearchRequest, DeployRequest,
    DeployResponse, ErrorResponse, GetApiKeyRequest, GetLogRequest, SetApiKeyRequest,
    VerifyServerRequest, VerifyServerResponse,
};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{error, info};
use url::Url;

use crate::bundle::archive::resolve_member_path;
use crate::bundle::{make_bundle, Bundle, BundleSource};
use crate::deploy::search::app_search;
use crate::deploy::{self, Deployer};
use crate::environment::Environment;
use crate::errors::PublishError;
use crate::filesys::file::File;
use crate::http::api::ConnectApi;
use crate::http::verify::{address_hash, verify_server};
use crate::http::ConnectClient;
use crate::server::state::ServerState;

/// Error answered as `{"error": message}`
#[derive(Debug)]
pub struct EndpointError {
    pub status: StatusCode,
    pub message: String,
}

impl EndpointError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn bundle_failed(err: PublishError) -> Self {
        error!("Bundle creation failed: {}", err);
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Bundle creation failed: {}", err),
        )
    }
}

impl From<PublishError> for EndpointError {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::Server(_) | PublishError::Internal(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            _ => Self::bad_request(err.to_string()),
        }
    }
}

impl IntoResponse for EndpointError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}

/// Dispatch `POST /nbpublish/{action}`
pub async fn action_handler(
    State(state): State<Arc<ServerState>>,
    UrlPath(action): UrlPath<String>,
    body: Bytes,
) -> Result<Response, EndpointError> {
    match action.as_str() {
        "verify_server" => verify_server_action(parse(&body)?).await,
        "app_search" => app_search_action(&state, parse(&body)?).await,
        "deploy" => deploy_action(&state, parse(&body)?).await,
        "app_get" => app_get_action(&state, parse(&body)?).await,
        "get_log" => get_log_action(&state, parse(&body)?).await,
        "app_config" => app_config_action(&state, parse(&body)?).await,
        "get_api_key" => get_api_key_action(&state, parse(&body)?).await,
        "set_api_key" => set_api_key_action(&state, parse(&body)?).await,
        _ => Err(EndpointError::new(
            StatusCode::NOT_FOUND,
            format!("Unknown action: {}", action),
        )),
    }
}

fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T, EndpointError> {
    serde_json::from_slice(body)
        .map_err(|e| EndpointError::bad_request(format!("Invalid request body: {}", e)))
}

fn open_client(state: &ServerState, server_address: &str, api_key: &str) -> Result<ConnectClient, EndpointError> {
    let server = Url::parse(server_address)
        .map_err(|e| EndpointError::bad_request(format!("Invalid server address: {}", e)))?;
    let api_key = SecretString::from(api_key.to_string());
    Ok(ConnectClient::open_with(&server, api_key, &state.client_options)?)
}

async fn verify_server_action(request: VerifyServerRequest) -> Result<Response, EndpointError> {
    match verify_server(&request.server_address).await? {
        Some(canonical) => Ok(Json(VerifyServerResponse {
            status: "Provided server is running a publishing server".to_string(),
            address_hash: address_hash(&request.server_address),
            server_address: canonical,
        })
        .into_response()),
        None => Err(EndpointError::bad_request(
            "Unable to verify the provided server is running a publishing server",
        )),
    }
}

async fn app_search_action(state: &ServerState, request: AppSearchRequest) -> Result<Response, EndpointError> {
    let mut client = open_client(state, &request.server_address, &request.api_key)?;
    let entries = app_search(&mut client, &request.notebook_title, request.app_id).await?;
    Ok(Json(entries).into_response())
}

async fn app_get_action(state: &ServerState, request: AppGetRequest) -> Result<Response, EndpointError> {
    let mut client = open_client(state, &request.server_address, &request.api_key)?;
    let app = client.get_application(request.app_id).await?;
    Ok(Json(app).into_response())
}

async fn get_log_action(state: &ServerState, request: GetLogRequest) -> Result<Response, EndpointError> {
    let task_id = match &request.task_id {
        serde_json::Value::String(id) => TaskId(id.clone()),
        serde_json::Value::Number(id) => TaskId(id.to_string()),
        other => return Err(EndpointError::bad_request(format!("Invalid task_id: {}", other))),
    };
    let mut client = open_client(state, &request.server_address, &request.api_key)?;
    let task = client.get_task(&task_id, request.last_status).await?;
    Ok(Json(task).into_response())
}

async fn app_config_action(state: &ServerState, request: AppConfigRequest) -> Result<Response, EndpointError> {
    let mut client = open_client(state, &request.server_address, &request.api_key)?;
    let config = client.get_application_config(request.app_id).await?;
    Ok(Json(config).into_response())
}

async fn get_api_key_action(state: &ServerState, request: GetApiKeyRequest) -> Result<Response, EndpointError> {
    let api_key = state.keys.get(&request.server_address).await?;
    Ok(Json(ApiKeyResponse {
        server_address: request.server_address,
        api_key: api_key.map(|key| key.expose_secret().to_string()),
    })
    .into_response())
}

async fn set_api_key_action(state: &ServerState, request: SetApiKeyRequest) -> Result<Response, EndpointError> {
    let api_key = SecretString::from(request.api_key);
    state.keys.set(&request.server_address, &api_key).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn deploy_action(state: &ServerState, request: DeployRequest) -> Result<Response, EndpointError> {
    let server = Url::parse(&request.server_address)
        .map_err(|e| EndpointError::bad_request(format!("Invalid server address: {}", e)))?;
    let notebook = resolve_notebook(&state.notebooks_dir, &request.notebook_path).await?;
    let mode: AppMode = request.app_mode.parse().map_err(EndpointError::bad_request)?;

    let bundle = match mode {
        AppMode::Static => static_bundle(state, &notebook, &request.notebook_title).await?,
        AppMode::JupyterStatic => {
            let environment = request.environment.clone().ok_or_else(|| {
                EndpointError::bad_request("environment is required for jupyter-static app_mode")
            })?;
            source_bundle(&notebook, Environment::from(environment)).await?
        }
    };

    info!(
        "Deploying {} as {} to {}",
        notebook.path().display(),
        mode,
        server
    );
    let deployer = Deployer::new(state.poll_options.clone()).with_cancellation(state.cancel.child_token());
    let outcome = deploy::deploy(
        &server,
        SecretString::from(request.api_key.clone()),
        &state.client_options,
        &deployer,
        deploy::DeployRequest {
            app_id: request.app_id,
            name: request.notebook_name.clone(),
            title: request.notebook_title.clone(),
            bundle,
        },
    )
    .await?;

    Ok(Json(DeployResponse {
        app_id: outcome.app_id,
        config_url: outcome.config_url,
        task_log: outcome.task_log,
    })
    .into_response())
}

/// Resolve a front end notebook path below `root`
async fn resolve_notebook(root: &Path, notebook_path: &str) -> Result<File, EndpointError> {
    let not_a_notebook = || EndpointError::bad_request(format!("Not a notebook: {}", notebook_path));

    let rel_path = notebook_path.trim_matches('/');
    let (_, path) = resolve_member_path(rel_path, root).map_err(|_| not_a_notebook())?;
    if path.extension().and_then(|ext| ext.to_str()) != Some("ipynb") {
        return Err(not_a_notebook());
    }

    let file = File::new(path);
    if !file.exists().await {
        return Err(not_a_notebook());
    }
    Ok(file)
}

async fn static_bundle(state: &ServerState, notebook: &File, title: &str) -> Result<Bundle, EndpointError> {
    let output = state
        .renderer
        .render(notebook.path(), title)
        .await
        .map_err(EndpointError::bundle_failed)?;

    build(BundleSource::Static {
        output_name: output.filename,
        output: output.html,
    })
    .await
}

async fn source_bundle(notebook: &File, environment: Environment) -> Result<Bundle, EndpointError> {
    let notebook_name = notebook
        .name()
        .ok_or_else(|| EndpointError::bad_request("Notebook path has no file name"))?
        .to_string();
    let contents = notebook
        .read_bytes()
        .await
        .map_err(EndpointError::bundle_failed)?;

    build(BundleSource::Source {
        notebook_name,
        notebook: contents,
        environment,
        extra_files: Vec::new(),
        base_dir: notebook.dir().to_path_buf(),
    })
    .await
}

async fn build(source: BundleSource) -> Result<Bundle, EndpointError> {
    tokio::task::spawn_blocking(move || make_bundle(&source))
        .await
        .map_err(PublishError::from)
        .and_then(|result| result)
        .map_err(EndpointError::bundle_failed)
}
