//! Settings file management

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::PublishError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// Publisher settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON
    #[serde(default)]
    pub json_logs: bool,

    /// Directory for rolled log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Extension endpoint server
    #[serde(default)]
    pub server: ServerSettings,

    /// Root the endpoint resolves notebook paths against
    #[serde(default = "default_notebooks_dir")]
    pub notebooks_dir: PathBuf,

    /// Deploy task polling
    #[serde(default)]
    pub deploy: DeploySettings,

    /// Publishing server client
    #[serde(default)]
    pub client: ClientSettings,
}

fn default_notebooks_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            json_logs: false,
            log_dir: None,
            server: ServerSettings::default(),
            notebooks_dir: default_notebooks_dir(),
            deploy: DeploySettings::default(),
            client: ClientSettings::default(),
        }
    }
}

/// Endpoint server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8899
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Deploy polling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploySettings {
    /// Seconds without a new task status line before giving up
    #[serde(default = "default_inactivity_timeout")]
    pub inactivity_timeout_secs: u64,

    /// Pause between task polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_inactivity_timeout() -> u64 {
    600
}

fn default_poll_interval() -> u64 {
    1000
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            inactivity_timeout_secs: default_inactivity_timeout(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

/// HTTP client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    300
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Load settings from `file`, falling back to defaults when it does not exist
pub async fn load_settings(file: &File) -> Result<Settings, PublishError> {
    if !file.exists().await {
        debug!("No settings at {}, using defaults", file.path().display());
        return Ok(Settings::default());
    }
    file.read_json().await.map_err(|e| {
        PublishError::Config(format!("Invalid settings {}: {}", file.path().display(), e))
    })
}
