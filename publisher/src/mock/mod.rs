//! Mock publishing server
//!
//! A small in-memory implementation of the publishing server API, used for
//! local development (`--mock-server`) and the integration tests.

pub mod repository;
pub mod routes;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;
use url::Url;

use crate::errors::PublishError;

pub use repository::{Repository, TaskScript, DEFAULT_API_KEY};
pub use routes::{router, MockState};

/// A running mock server
pub struct MockServer {
    pub url: Url,
    pub state: MockState,
    pub handle: JoinHandle<Result<(), PublishError>>,
}

/// Bind `addr` and serve `repository` until `shutdown_signal` resolves
///
/// The repository's content URLs are rewritten to the bound address, so
/// `127.0.0.1:0` can be used to pick a free port.
pub async fn start(
    addr: &str,
    mut repository: Repository,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<MockServer, PublishError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| PublishError::Server(format!("Could not bind {}: {}", addr, e)))?;
    let local: SocketAddr = listener.local_addr()?;
    let url = Url::parse(&format!("http://{}/", local))?;

    repository.set_base_url(url.as_str());
    let state: MockState = Arc::new(Mutex::new(repository));
    let app = router(state.clone());

    info!("Mock publishing server listening on {}", url);
    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| PublishError::Server(e.to_string()))
    });

    Ok(MockServer { url, state, handle })
}
