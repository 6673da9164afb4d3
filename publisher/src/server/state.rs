//! Server state

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::deploy::PollOptions;
use crate::http::ClientOptions;
use crate::render::NotebookRenderer;
use crate::storage::keys::KeyStore;

/// Server state shared across handlers
pub struct ServerState {
    /// Root that request notebook paths are resolved against
    pub notebooks_dir: PathBuf,
    pub renderer: Arc<dyn NotebookRenderer>,
    pub poll_options: PollOptions,
    pub client_options: ClientOptions,
    pub keys: KeyStore,
    /// Cancelled on shutdown; in-flight deploys observe a child token
    pub cancel: CancellationToken,
}

impl ServerState {
    pub fn new(
        notebooks_dir: impl Into<PathBuf>,
        renderer: Arc<dyn NotebookRenderer>,
        poll_options: PollOptions,
        client_options: ClientOptions,
        keys: KeyStore,
    ) -> Self {
        Self {
            notebooks_dir: notebooks_dir.into(),
            renderer,
            poll_options,
            client_options,
            keys,
            cancel: CancellationToken::new(),
        }
    }
}
