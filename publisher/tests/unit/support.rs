//! Test doubles shared by the integration tests

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use connect_models::{
    AppConfig, AppId, Application, ApplicationUpdate, BundleId, BundleRecord, TaskId, TaskRecord,
    User,
};
use nbpublish::deploy::Clock;
use nbpublish::environment::{Environment, PackageManager};
use nbpublish::errors::PublishError;
use nbpublish::http::{AppFilters, ConnectApi};

/// Clock whose sleeps advance virtual time instantly
pub struct FakeClock {
    start: Instant,
    elapsed: Mutex<Duration>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap()
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        *self.elapsed.lock().unwrap() += duration;
    }
}

pub fn task(id: u64, finished: bool, code: i32, status: &[&str], last_status: u64) -> TaskRecord {
    TaskRecord {
        id: TaskId::from(id),
        finished,
        code,
        error: String::new(),
        status: status.iter().map(|s| s.to_string()).collect(),
        last_status,
    }
}

pub fn application(id: AppId, title: &str, app_mode: Option<i32>) -> Application {
    Application {
        id,
        name: format!("app{}", id),
        title: title.to_string(),
        url: None,
        bundle_id: None,
        app_mode,
        needs_config: true,
        access_type: None,
        description: None,
        owner_username: None,
        created_time: None,
        last_deployed_time: None,
    }
}

/// Scripted publishing server recording every call
pub struct FakeApi {
    pub app: Application,
    pub calls: Vec<String>,
    /// Task records returned by successive polls; the last one repeats
    pub polls: VecDeque<TaskRecord>,
    pub trigger_error: Option<String>,
    pub applications: Vec<Application>,
}

impl FakeApi {
    pub fn new(app: Application, polls: Vec<TaskRecord>) -> Self {
        Self {
            app,
            calls: Vec::new(),
            polls: polls.into(),
            trigger_error: None,
            applications: Vec::new(),
        }
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.iter().filter(|c| c.as_str() == call).count()
    }
}

#[async_trait]
impl ConnectApi for FakeApi {
    async fn get_current_user(&mut self) -> Result<User, PublishError> {
        self.calls.push("get_current_user".into());
        Err(PublishError::Internal("not scripted".into()))
    }

    async fn find_applications(&mut self, _filters: &AppFilters) -> Result<Vec<Application>, PublishError> {
        self.calls.push("find_applications".into());
        Ok(self.applications.clone())
    }

    async fn create_application(&mut self, name: &str) -> Result<Application, PublishError> {
        self.calls.push("create_application".into());
        self.app.name = name.to_string();
        Ok(self.app.clone())
    }

    async fn get_application(&mut self, id: AppId) -> Result<Application, PublishError> {
        self.calls.push("get_application".into());
        if id == self.app.id {
            return Ok(self.app.clone());
        }
        self.applications
            .iter()
            .find(|app| app.id == id)
            .cloned()
            .ok_or_else(|| PublishError::Application("Not found".into()))
    }

    async fn update_application(
        &mut self,
        _id: AppId,
        updates: &ApplicationUpdate,
    ) -> Result<Application, PublishError> {
        self.calls.push("update_application".into());
        if let Some(title) = &updates.title {
            self.app.title = title.clone();
        }
        Ok(self.app.clone())
    }

    async fn upload_bundle(&mut self, app_id: AppId, _bundle: Vec<u8>) -> Result<BundleRecord, PublishError> {
        self.calls.push("upload_bundle".into());
        Ok(BundleRecord {
            id: 11,
            app_id,
            created_time: None,
            updated_time: None,
        })
    }

    async fn trigger_deploy(&mut self, _app_id: AppId, _bundle_id: BundleId) -> Result<TaskRecord, PublishError> {
        self.calls.push("trigger_deploy".into());
        if let Some(message) = &self.trigger_error {
            return Err(PublishError::Application(message.clone()));
        }
        Ok(task(1, false, 0, &[], 0))
    }

    async fn publish_application(&mut self, _app_id: AppId, access_type: &str) -> Result<Application, PublishError> {
        self.calls.push("publish_application".into());
        self.app.access_type = Some(access_type.to_string());
        Ok(self.app.clone())
    }

    async fn get_application_config(&mut self, app_id: AppId) -> Result<AppConfig, PublishError> {
        self.calls.push("get_application_config".into());
        Ok(AppConfig {
            config_url: format!("http://connect/content/apps/{}", app_id),
        })
    }

    async fn get_task(&mut self, _task_id: &TaskId, _first_status: Option<u64>) -> Result<TaskRecord, PublishError> {
        self.calls.push("get_task".into());
        let next = if self.polls.len() > 1 {
            self.polls.pop_front()
        } else {
            self.polls.front().cloned()
        };
        next.ok_or_else(|| PublishError::Internal("no task scripted".into()))
    }
}

/// Pip environment with a one line requirements file
pub fn pip_environment() -> Environment {
    Environment {
        package_manager: PackageManager::Pip,
        package_file_name: "requirements.txt".to_string(),
        package_file_contents: b"numpy\npandas\nmatplotlib\n".to_vec(),
        interpreter_version: "3.11.4".to_string(),
        package_manager_version: "23.1.2".to_string(),
        locale: "en_US.UTF-8".to_string(),
    }
}

/// Write `dummy.ipynb` into `dir`
pub fn write_notebook(dir: &Path) -> Vec<u8> {
    let notebook = br#"{"cells": [], "metadata": {}, "nbformat": 4, "nbformat_minor": 2}"#.to_vec();
    std::fs::write(dir.join("dummy.ipynb"), &notebook).unwrap();
    notebook
}
