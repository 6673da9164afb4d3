//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, routing::post, Router};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::PublishError;
use crate::server::handlers::action_handler;
use crate::server::state::ServerState;

/// Largest accepted request body (environment payloads carry file contents)
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Build the endpoint router
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/nbpublish/{action}", post(action_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), PublishError>>, PublishError> {
    let app = router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| PublishError::Server(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| PublishError::Server(e.to_string()))
    });

    Ok(handle)
}
