//! Typed publishing server operations

use async_trait::async_trait;
use connect_models::{
    AppConfig, AppId, Application, ApplicationList, ApplicationUpdate, BundleId, BundleRecord,
    CreateApplication, DeployBundle, TaskId, TaskRecord, User,
};

use crate::errors::PublishError;
use crate::http::client::ConnectClient;

/// Filters for `find_applications`
#[derive(Debug, Clone)]
pub struct AppFilters {
    /// Title prefix to search for
    pub search: Option<String>,

    /// Maximum number of results
    pub count: u32,

    /// Least role the caller must hold on each result
    pub min_role: String,
}

impl Default for AppFilters {
    fn default() -> Self {
        Self {
            search: None,
            count: 5,
            min_role: "editor".to_string(),
        }
    }
}

impl AppFilters {
    fn to_query(&self) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query.append_pair("count", &self.count.to_string());
        query.append_pair("filter", &format!("min_role:{}", self.min_role));
        if let Some(search) = &self.search {
            query.append_pair("search", search);
        }
        query.finish()
    }
}

/// Publishing server API; each call is exactly one round trip
#[async_trait]
pub trait ConnectApi: Send {
    async fn get_current_user(&mut self) -> Result<User, PublishError>;

    async fn find_applications(&mut self, filters: &AppFilters) -> Result<Vec<Application>, PublishError>;

    async fn create_application(&mut self, name: &str) -> Result<Application, PublishError>;

    async fn get_application(&mut self, id: AppId) -> Result<Application, PublishError>;

    async fn update_application(
        &mut self,
        id: AppId,
        updates: &ApplicationUpdate,
    ) -> Result<Application, PublishError>;

    async fn upload_bundle(&mut self, app_id: AppId, bundle: Vec<u8>) -> Result<BundleRecord, PublishError>;

    async fn trigger_deploy(&mut self, app_id: AppId, bundle_id: BundleId) -> Result<TaskRecord, PublishError>;

    async fn publish_application(&mut self, app_id: AppId, access_type: &str) -> Result<Application, PublishError>;

    async fn get_application_config(&mut self, app_id: AppId) -> Result<AppConfig, PublishError>;

    /// Fetch a task; with `first_status` only lines from that index on are returned
    async fn get_task(&mut self, task_id: &TaskId, first_status: Option<u64>) -> Result<TaskRecord, PublishError>;
}

#[async_trait]
impl ConnectApi for ConnectClient {
    async fn get_current_user(&mut self) -> Result<User, PublishError> {
        self.get("__api__/me").await
    }

    async fn find_applications(&mut self, filters: &AppFilters) -> Result<Vec<Application>, PublishError> {
        let path = format!("__api__/applications?{}", filters.to_query());
        let list: ApplicationList = self.get(&path).await?;
        Ok(list.applications)
    }

    async fn create_application(&mut self, name: &str) -> Result<Application, PublishError> {
        let body = CreateApplication {
            name: name.to_string(),
            title: None,
        };
        self.post("__api__/applications", &body).await
    }

    async fn get_application(&mut self, id: AppId) -> Result<Application, PublishError> {
        self.get(&format!("__api__/applications/{}", id)).await
    }

    async fn update_application(
        &mut self,
        id: AppId,
        updates: &ApplicationUpdate,
    ) -> Result<Application, PublishError> {
        self.post(&format!("__api__/applications/{}", id), updates).await
    }

    async fn upload_bundle(&mut self, app_id: AppId, bundle: Vec<u8>) -> Result<BundleRecord, PublishError> {
        self.post_bytes(&format!("__api__/applications/{}/upload", app_id), bundle)
            .await
    }

    async fn trigger_deploy(&mut self, app_id: AppId, bundle_id: BundleId) -> Result<TaskRecord, PublishError> {
        let body = DeployBundle {
            bundle: Some(bundle_id),
        };
        self.post(&format!("__api__/applications/{}/deploy", app_id), &body)
            .await
    }

    async fn publish_application(&mut self, app_id: AppId, access_type: &str) -> Result<Application, PublishError> {
        let updates = ApplicationUpdate::publish(access_type);
        self.post(&format!("__api__/applications/{}", app_id), &updates)
            .await
    }

    async fn get_application_config(&mut self, app_id: AppId) -> Result<AppConfig, PublishError> {
        self.get(&format!("__api__/applications/{}/config", app_id)).await
    }

    async fn get_task(&mut self, task_id: &TaskId, first_status: Option<u64>) -> Result<TaskRecord, PublishError> {
        let mut path = format!("__api__/tasks/{}", task_id);
        if let Some(first) = first_status {
            path.push_str(&format!("?first_status={}", first));
        }
        self.get(&path).await
    }
}
