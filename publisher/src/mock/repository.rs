//! In-memory store behind the mock publishing server

use std::collections::{BTreeMap, HashMap};

use chrono::{SubsecRound, Utc};
use connect_models::{
    AppConfig, AppId, AppMode, Application, ApplicationList, ApplicationUpdate, BundleId,
    BundleRecord, TaskId, TaskRecord, User,
};
use http::StatusCode;

use crate::bundle::archive::read_member;
use crate::bundle::manifest::{Manifest, MANIFEST_NAME};

/// API key accepted by a default repository
pub const DEFAULT_API_KEY: &str = "0123456789abcdef0123456789abcdef";

const BUILD_STATUS: &str = "Building static content";
const DEPLOY_STATUS: &str = "Deploying static content";

/// Error answered to the client as `{"error": message}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoError {
    pub status: StatusCode,
    pub message: String,
}

impl RepoError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not found")
    }
}

/// How deploy tasks progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskScript {
    /// Polls a task stays unfinished for; `None` never finishes
    pub polls_before_finish: Option<u32>,

    /// Exit code of finished tasks
    pub exit_code: i32,
}

impl Default for TaskScript {
    fn default() -> Self {
        Self {
            polls_before_finish: Some(0),
            exit_code: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct MockTask {
    record: TaskRecord,
    remaining: Option<u32>,
    exit_code: i32,
}

/// Applications, bundles and tasks with monotonic ids
#[derive(Debug)]
pub struct Repository {
    base_url: String,
    users: HashMap<String, User>,
    apps: BTreeMap<AppId, Application>,
    next_app_id: AppId,
    bundles: HashMap<BundleId, (BundleRecord, Vec<u8>)>,
    next_bundle_id: BundleId,
    tasks: HashMap<TaskId, MockTask>,
    next_task_id: u64,
    task_script: TaskScript,
    /// Updates that set an access type, per application
    publishes: HashMap<AppId, u32>,
}

impl Repository {
    /// Empty repository; `base_url` prefixes generated content URLs
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        let mut users = HashMap::new();
        users.insert(DEFAULT_API_KEY.to_string(), admin_user());

        Self {
            base_url,
            users,
            apps: BTreeMap::new(),
            next_app_id: 0,
            bundles: HashMap::new(),
            next_bundle_id: 0,
            tasks: HashMap::new(),
            next_task_id: 0,
            task_script: TaskScript::default(),
            publishes: HashMap::new(),
        }
    }

    pub fn with_task_script(mut self, script: TaskScript) -> Self {
        self.task_script = script;
        self
    }

    pub fn set_base_url(&mut self, base_url: impl Into<String>) {
        self.base_url = base_url.into();
        if !self.base_url.ends_with('/') {
            self.base_url.push('/');
        }
    }

    /// User owning `api_key`
    pub fn authenticate(&self, api_key: &str) -> Option<User> {
        self.users.get(api_key).cloned()
    }

    pub fn create_application(
        &mut self,
        name: &str,
        title: Option<String>,
        owner: &User,
    ) -> Result<Application, RepoError> {
        if !name.is_empty() && self.apps.values().any(|app| app.name == name) {
            return Err(RepoError::new(
                StatusCode::CONFLICT,
                "An object with that name already exists.",
            ));
        }

        self.next_app_id += 1;
        let id = self.next_app_id;
        let app = Application {
            id,
            name: name.to_string(),
            title: title.unwrap_or_default(),
            url: Some(format!("{}content/{}", self.base_url, id)),
            bundle_id: None,
            app_mode: None,
            needs_config: true,
            access_type: None,
            description: Some(String::new()),
            owner_username: Some(owner.username.clone()),
            created_time: Some(Utc::now().trunc_subsecs(0)),
            last_deployed_time: None,
        };
        self.apps.insert(id, app.clone());
        Ok(app)
    }

    /// Applications whose title starts with `search`, at most `count`
    pub fn find_applications(&self, search: Option<&str>, count: usize) -> ApplicationList {
        let matches: Vec<Application> = self
            .apps
            .values()
            .filter(|app| search.map_or(true, |s| app.title.starts_with(s)))
            .take(count)
            .cloned()
            .collect();

        ApplicationList {
            count: matches.len() as u64,
            total: matches.len() as u64,
            applications: matches,
        }
    }

    pub fn get_application(&self, id: AppId) -> Result<Application, RepoError> {
        self.apps.get(&id).cloned().ok_or_else(RepoError::not_found)
    }

    pub fn update_application(
        &mut self,
        id: AppId,
        updates: &ApplicationUpdate,
    ) -> Result<Application, RepoError> {
        let app = self.apps.get_mut(&id).ok_or_else(RepoError::not_found)?;
        if let Some(title) = &updates.title {
            app.title = title.clone();
        }
        if let Some(access_type) = &updates.access_type {
            app.access_type = Some(access_type.clone());
            *self.publishes.entry(id).or_insert(0) += 1;
        }
        if let Some(needs_config) = updates.needs_config {
            app.needs_config = needs_config;
        }
        if let Some(description) = &updates.description {
            app.description = Some(description.clone());
        }
        Ok(app.clone())
    }

    pub fn config(&self, id: AppId) -> Result<AppConfig, RepoError> {
        let app = self.get_application(id)?;
        Ok(AppConfig {
            config_url: format!("{}content/apps/{}", self.base_url, app.id),
        })
    }

    pub fn upload(&mut self, app_id: AppId, tarball: Vec<u8>) -> Result<BundleRecord, RepoError> {
        self.get_application(app_id)?;

        self.next_bundle_id += 1;
        let now = Utc::now().trunc_subsecs(0);
        let record = BundleRecord {
            id: self.next_bundle_id,
            app_id,
            created_time: Some(now),
            updated_time: Some(now),
        };
        self.bundles.insert(record.id, (record.clone(), tarball));
        Ok(record)
    }

    /// Deploy a bundle; the app mode is fixed by the first deploy
    pub fn deploy(&mut self, app_id: AppId, bundle_id: Option<BundleId>) -> Result<TaskRecord, RepoError> {
        self.get_application(app_id)?;

        let bundle_id = bundle_id
            .ok_or_else(|| RepoError::new(StatusCode::BAD_REQUEST, "bundle_id is required"))?;
        let (_, tarball) = self.bundles.get(&bundle_id).ok_or_else(|| {
            RepoError::new(
                StatusCode::NOT_FOUND,
                format!("bundle {} not found", bundle_id),
            )
        })?;

        let manifest = read_manifest(tarball)?;
        let new_mode = manifest.metadata.appmode.code();

        let app = self.apps.get_mut(&app_id).ok_or_else(RepoError::not_found)?;
        if matches!(app.app_mode, Some(old) if old != new_mode) {
            return Err(RepoError::new(
                StatusCode::BAD_REQUEST,
                "Cannot change app mode once deployed",
            ));
        }
        app.app_mode = Some(new_mode);
        app.bundle_id = Some(bundle_id);
        app.last_deployed_time = Some(Utc::now().trunc_subsecs(0));

        self.next_task_id += 1;
        let id = TaskId::from(self.next_task_id);
        let mut task = MockTask {
            record: TaskRecord {
                id: id.clone(),
                finished: false,
                code: 0,
                error: String::new(),
                status: vec![BUILD_STATUS.to_string()],
                last_status: 0,
            },
            remaining: self.task_script.polls_before_finish,
            exit_code: self.task_script.exit_code,
        };
        if task.remaining == Some(0) {
            finish(&mut task);
        }
        task.record.last_status = task.record.status.len() as u64;

        let record = task.record.clone();
        self.tasks.insert(id, task);
        Ok(record)
    }

    /// Poll a task, advancing its script by one step
    pub fn get_task(&mut self, id: &TaskId, first_status: Option<u64>) -> Result<TaskRecord, RepoError> {
        let task = self.tasks.get_mut(id).ok_or_else(RepoError::not_found)?;

        if !task.record.finished {
            let remaining = task.remaining;
            match remaining {
                Some(0) => finish(task),
                Some(n) => {
                    task.remaining = Some(n - 1);
                    task.record.status.push(format!("Still building ({} left)", n));
                }
                None => {}
            }
            task.record.last_status = task.record.status.len() as u64;
        }

        let mut record = task.record.clone();
        let first = first_status.unwrap_or(0).min(record.status.len() as u64) as usize;
        record.status = record.status.split_off(first);
        Ok(record)
    }

    /// HTML document of the currently deployed bundle
    pub fn content(&self, id: AppId) -> Result<Vec<u8>, RepoError> {
        let app = self.get_application(id)?;
        let bundle_id = app.bundle_id.ok_or_else(RepoError::not_found)?;
        let (_, tarball) = self.bundles.get(&bundle_id).ok_or_else(RepoError::not_found)?;

        let manifest = read_manifest(tarball)?;
        let name = manifest
            .metadata
            .primary_html
            .unwrap_or(manifest.metadata.entrypoint);
        read_member(tarball, &name)
            .map_err(|e| RepoError::new(StatusCode::BAD_REQUEST, e.to_string()))?
            .ok_or_else(RepoError::not_found)
    }

    /// Mode an application is locked to, if any
    pub fn app_mode(&self, id: AppId) -> Option<AppMode> {
        self.apps.get(&id).and_then(|app| app.mode())
    }

    /// Times an application has been published
    pub fn publish_count(&self, id: AppId) -> u32 {
        self.publishes.get(&id).copied().unwrap_or(0)
    }
}

fn finish(task: &mut MockTask) {
    task.record.status.push(DEPLOY_STATUS.to_string());
    task.record.finished = true;
    task.record.code = task.exit_code;
    if task.exit_code != 0 {
        task.record.error = format!("exit status {}", task.exit_code);
    }
}

fn read_manifest(tarball: &[u8]) -> Result<Manifest, RepoError> {
    let invalid = |msg: String| RepoError::new(StatusCode::BAD_REQUEST, msg);
    let data = read_member(tarball, MANIFEST_NAME)
        .map_err(|e| invalid(format!("invalid bundle: {}", e)))?
        .ok_or_else(|| invalid("bundle has no manifest.json".to_string()))?;
    Manifest::from_json(&data).map_err(|e| invalid(format!("invalid manifest: {}", e)))
}

fn admin_user() -> User {
    User {
        username: "admin".to_string(),
        guid: Some(uuid::Uuid::new_v4()),
        first_name: Some("Super".to_string()),
        last_name: Some("User".to_string()),
        email: Some("admin@example.com".to_string()),
        user_role: Some("administrator".to_string()),
        locked: false,
        privileges: ["publish_apps", "change_apps", "view_apps", "remove_apps"]
            .iter()
            .map(|p| p.to_string())
            .collect(),
    }
}
