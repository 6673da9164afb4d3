//! API models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Application identifier assigned by the server
pub type AppId = u64;

/// Bundle identifier assigned by the server
pub type BundleId = u64;

/// Application content mode
///
/// The server stores the mode as an integer code on the application record,
/// while bundle manifests name it with a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppMode {
    /// Prebuilt static HTML
    #[serde(rename = "static")]
    Static,

    /// Notebook source rendered by the server
    #[serde(rename = "jupyter-static")]
    JupyterStatic,
}

impl AppMode {
    pub const STATIC_CODE: i32 = 4;
    pub const JUPYTER_STATIC_CODE: i32 = 7;

    /// Integer code stored on the application record
    pub fn code(&self) -> i32 {
        match self {
            AppMode::Static => Self::STATIC_CODE,
            AppMode::JupyterStatic => Self::JUPYTER_STATIC_CODE,
        }
    }

    /// Resolve a record code; unknown codes belong to other content types
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            Self::STATIC_CODE => Some(AppMode::Static),
            Self::JUPYTER_STATIC_CODE => Some(AppMode::JupyterStatic),
            _ => None,
        }
    }

    /// Manifest name of the mode
    pub fn as_str(&self) -> &'static str {
        match self {
            AppMode::Static => "static",
            AppMode::JupyterStatic => "jupyter-static",
        }
    }
}

impl fmt::Display for AppMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "static" => Ok(AppMode::Static),
            "jupyter-static" => Ok(AppMode::JupyterStatic),
            _ => Err(format!(
                "Invalid app_mode: {}, must be \"static\" or \"jupyter-static\"",
                s
            )),
        }
    }
}

/// Current user, as returned by `GET /__api__/me`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    #[serde(default)]
    pub guid: Option<uuid::Uuid>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_role: Option<String>,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub privileges: Vec<String>,
}

/// Application record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: AppId,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub bundle_id: Option<BundleId>,
    /// Integer mode code; null until the first successful deploy
    #[serde(default)]
    pub app_mode: Option<i32>,
    #[serde(default)]
    pub needs_config: bool,
    #[serde(default)]
    pub access_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner_username: Option<String>,
    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_deployed_time: Option<DateTime<Utc>>,
}

impl Application {
    /// Mode of the application, if it has been deployed with a known mode
    pub fn mode(&self) -> Option<AppMode> {
        self.app_mode.and_then(AppMode::from_code)
    }
}

/// Result page of `GET /__api__/applications`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationList {
    pub count: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub applications: Vec<Application>,
}

/// Body of `POST /__api__/applications`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateApplication {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Partial field updates for `POST /__api__/applications/{id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_config: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ApplicationUpdate {
    /// Update that only changes the title
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Update that publishes the application with the given access type
    pub fn publish(access_type: impl Into<String>) -> Self {
        Self {
            access_type: Some(access_type.into()),
            needs_config: Some(false),
            ..Default::default()
        }
    }
}

/// Bundle record created by an upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleRecord {
    pub id: BundleId,
    pub app_id: AppId,
    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_time: Option<DateTime<Utc>>,
}

/// Body of `POST /__api__/applications/{id}/deploy`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployBundle {
    pub bundle: Option<BundleId>,
}

/// Task identifier
///
/// Servers hand out either numeric or string ids; both are kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for TaskId {
    fn from(id: u64) -> Self {
        TaskId(id.to_string())
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        TaskId(id.to_string())
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(s) => Ok(TaskId(s)),
            serde_json::Value::Number(n) => Ok(TaskId(n.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "invalid task id: {}",
                other
            ))),
        }
    }
}

/// Asynchronous build/deploy task
///
/// `status` holds the lines at or after the requested `first_status` index,
/// while `last_status` is the total number of lines produced so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub status: Vec<String>,
    #[serde(default)]
    pub last_status: u64,
}

/// Body of `GET /__api__/applications/{id}/config`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub config_url: String,
}

/// Structured error body returned with 4xx/5xx responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
