//! Endpoint models
//!
//! One request body per endpoint action. Field names follow what the
//! notebook front end posts.

use serde::{Deserialize, Serialize};

/// Request for `verify_server`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyServerRequest {
    pub server_address: String,
}

/// Response for `verify_server`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyServerResponse {
    pub status: String,
    pub address_hash: String,
    pub server_address: String,
}

/// Request for `app_search`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSearchRequest {
    pub server_address: String,
    pub api_key: String,
    pub notebook_title: String,
    #[serde(default)]
    pub app_id: Option<u64>,
}

/// One entry of the `app_search` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSearchEntry {
    pub id: u64,
    pub name: String,
    pub title: String,
    pub app_mode: Option<String>,
    pub config_url: String,
}

/// Package manager named by an environment payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManagerName {
    Pip,
    Conda,
}

impl PackageManagerName {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageManagerName::Pip => "pip",
            PackageManagerName::Conda => "conda",
        }
    }
}

/// Python environment as reported by the kernel-side introspector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentPayload {
    pub package_manager: PackageManagerName,
    /// Package spec file name, e.g. `requirements.txt`
    pub filename: String,
    /// Package spec file contents
    pub contents: String,
    /// Interpreter version, e.g. `3.11.4`
    pub python: String,
    /// Package manager version; older front ends key it by manager name
    #[serde(alias = "pip", alias = "conda")]
    pub package_manager_version: String,
    pub locale: String,
    /// Where the spec came from: `file` or `pip_freeze`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Request for `deploy`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployRequest {
    pub server_address: String,
    pub api_key: String,
    #[serde(default)]
    pub app_id: Option<u64>,
    pub notebook_title: String,
    pub notebook_name: String,
    pub notebook_path: String,
    pub app_mode: String,
    #[serde(default)]
    pub environment: Option<EnvironmentPayload>,
}

/// Response for `deploy`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployResponse {
    pub app_id: u64,
    pub config_url: String,
    #[serde(default)]
    pub task_log: Vec<String>,
}

/// Request for `app_get`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppGetRequest {
    pub server_address: String,
    pub api_key: String,
    pub app_id: u64,
}

/// Request for `get_log`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetLogRequest {
    pub server_address: String,
    pub api_key: String,
    pub task_id: serde_json::Value,
    #[serde(default)]
    pub last_status: Option<u64>,
}

/// Request for `app_config`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfigRequest {
    pub server_address: String,
    pub api_key: String,
    pub app_id: u64,
}

/// Request for `get_api_key`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetApiKeyRequest {
    pub server_address: String,
}

/// Response for `get_api_key`; `api_key` is null when none is stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyResponse {
    pub server_address: String,
    pub api_key: Option<String>,
}

/// Request for `set_api_key`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetApiKeyRequest {
    pub server_address: String,
    pub api_key: String,
}

/// Error body returned by every action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
