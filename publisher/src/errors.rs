//! Error types for the notebook publisher

use thiserror::Error;

/// Main error type for the notebook publisher
#[derive(Error, Debug)]
pub enum PublishError {
    /// Local file access while building a bundle or reading settings
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Connection failure, 5xx response or unparseable body
    #[error("Transport error: {0}")]
    Transport(String),

    /// 4xx response carrying the server's own message
    #[error("{0}")]
    Application(String),

    /// No task progress within the inactivity window
    #[error("Deployment timed out: {0}")]
    Timeout(String),

    /// Task finished with a non-zero exit code
    #[error("Failed to deploy: {0}")]
    DeployFailed(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Environment error: {0}")]
    Environment(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PublishError {
    /// Whether the server rejected the request, as opposed to the request
    /// never completing
    pub fn is_application(&self) -> bool {
        matches!(self, PublishError::Application(_))
    }

    /// Whether the remote task may still be running
    pub fn is_timeout(&self) -> bool {
        matches!(self, PublishError::Timeout(_))
    }
}

impl From<reqwest::Error> for PublishError {
    fn from(err: reqwest::Error) -> Self {
        PublishError::Transport(err.to_string())
    }
}

impl From<url::ParseError> for PublishError {
    fn from(err: url::ParseError) -> Self {
        PublishError::Config(format!("invalid server address: {}", err))
    }
}

impl From<anyhow::Error> for PublishError {
    fn from(err: anyhow::Error) -> Self {
        PublishError::Internal(err.to_string())
    }
}

impl From<tokio::task::JoinError> for PublishError {
    fn from(err: tokio::task::JoinError) -> Self {
        PublishError::Internal(err.to_string())
    }
}
