//! Application configuration options

use std::path::PathBuf;
use std::time::Duration;

use crate::deploy::PollOptions;
use crate::http::ClientOptions;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Endpoint server configuration
    pub server: ServerOptions,

    /// Root that request notebook paths are resolved against
    pub notebooks_dir: PathBuf,

    /// Deploy task polling
    pub poll: PollOptions,

    /// Publishing server client timeouts
    pub client: ClientOptions,

    /// Where remembered API keys live
    pub storage: StorageLayout,

    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            server: ServerOptions::default(),
            notebooks_dir: PathBuf::from("."),
            poll: PollOptions::default(),
            client: ClientOptions::default(),
            storage: StorageLayout::default(),
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

impl From<&Settings> for AppOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            notebooks_dir: settings.notebooks_dir.clone(),
            poll: PollOptions {
                inactivity_timeout: Duration::from_secs(settings.deploy.inactivity_timeout_secs),
                interval: Duration::from_millis(settings.deploy.poll_interval_ms),
            },
            client: ClientOptions {
                connect_timeout: Duration::from_secs(settings.client.connect_timeout_secs),
                request_timeout: Duration::from_secs(settings.client.request_timeout_secs),
            },
            ..Default::default()
        }
    }
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8899,
        }
    }
}
