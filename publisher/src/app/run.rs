//! Endpoint server run loop

use std::future::Future;
use std::sync::Arc;

use tracing::{error, info};

use crate::app::options::AppOptions;
use crate::errors::PublishError;
use crate::render::NotebookRenderer;
use crate::server::serve::serve;
use crate::server::state::ServerState;
use crate::storage::keys::KeyStore;

/// Serve the extension endpoint until `shutdown_signal` resolves
///
/// Deploys still in flight at shutdown are cancelled; the server then gets
/// `max_shutdown_delay` to drain.
pub async fn run(
    options: AppOptions,
    renderer: Arc<dyn NotebookRenderer>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), PublishError> {
    info!("Initializing notebook publisher endpoint...");

    let state = Arc::new(ServerState::new(
        options.notebooks_dir.clone(),
        renderer,
        options.poll.clone(),
        options.client.clone(),
        KeyStore::new(options.storage.api_keys_file()),
    ));
    let cancel = state.cancel.clone();

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let handle = serve(&options.server, state, async move {
        let _ = stop_rx.await;
    })
    .await?;

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");
    cancel.cancel();
    let _ = stop_tx.send(());

    match tokio::time::timeout(options.max_shutdown_delay, handle).await {
        Ok(joined) => joined??,
        Err(_) => {
            error!(
                "Shutdown timed out after {:?}, abandoning open connections",
                options.max_shutdown_delay
            );
        }
    }

    info!("Shutdown complete");
    Ok(())
}
