//! Deploy orchestration
//!
//! Runs the deploy protocol against one server session: resolve the
//! application, reconcile its title, upload, trigger, poll, publish and
//! fetch the configuration URL. Any error stops the sequence; nothing
//! created on the server is rolled back.

use std::sync::Arc;

use connect_models::{AppId, ApplicationUpdate};
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use url::Url;

use crate::bundle::Bundle;
use crate::deploy::fsm::{DeployEvent, DeployPhase, DeploymentFsm};
use crate::deploy::poller::{wait_for_task, Clock, PollOptions, TokioClock};
use crate::errors::PublishError;
use crate::http::api::ConnectApi;
use crate::http::client::{ClientOptions, ConnectClient};

/// Access type applied when publishing
pub const PUBLISH_ACCESS_TYPE: &str = "acl";

/// One deploy invocation
#[derive(Debug)]
pub struct DeployRequest {
    /// Existing application to redeploy; a new one is created when absent
    pub app_id: Option<AppId>,

    /// Name for a newly created application
    pub name: String,

    /// Title the application should carry
    pub title: String,

    pub bundle: Bundle,
}

/// Result of a successful deploy
#[derive(Debug, Clone)]
pub struct DeployOutcome {
    pub app_id: AppId,
    pub config_url: String,
    pub task_log: Vec<String>,
}

/// Drives the deploy protocol
pub struct Deployer {
    options: PollOptions,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
}

impl Deployer {
    pub fn new(options: PollOptions) -> Self {
        Self {
            options,
            clock: Arc::new(TokioClock),
            cancel: CancellationToken::new(),
        }
    }

    /// Use a different time source for the poll loop
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Abandon the deploy when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the whole protocol over `api`
    pub async fn deploy<A>(&self, api: &mut A, request: DeployRequest) -> Result<DeployOutcome, PublishError>
    where
        A: ConnectApi + ?Sized,
    {
        let mut fsm = DeploymentFsm::new();
        match self.run(api, request, &mut fsm).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                match fsm.process(DeployEvent::Fail(e.to_string())) {
                    Ok(_) => error!(phase = ?fsm.failed_in(), "Deploy failed: {}", e),
                    Err(rejected) => {
                        debug!("Failure not recorded by the deploy FSM: {}", rejected);
                        error!(phase = ?fsm.phase(), "Deploy failed: {}", e);
                    }
                }
                Err(e)
            }
        }
    }

    async fn run<A>(
        &self,
        api: &mut A,
        request: DeployRequest,
        fsm: &mut DeploymentFsm,
    ) -> Result<DeployOutcome, PublishError>
    where
        A: ConnectApi + ?Sized,
    {
        let DeployRequest {
            app_id,
            name,
            title,
            bundle,
        } = request;

        self.advance(fsm, DeployEvent::Start)?;
        let app = match app_id {
            None => {
                info!("Creating application {}", name);
                api.create_application(&name).await?
            }
            // A deleted application surfaces as the server's own 404 error
            Some(id) => api.get_application(id).await?,
        };
        let app_id = app.id;
        self.advance(fsm, DeployEvent::Resolved)?;

        if app.title != title {
            info!("Updating title of application {} to {:?}", app_id, title);
            api.update_application(app_id, &ApplicationUpdate::title(title.as_str()))
                .await?;
        }
        self.advance(fsm, DeployEvent::TitleReconciled)?;

        info!(
            "Uploading {} bundle ({} bytes) to application {}",
            bundle.mode(),
            bundle.len(),
            app_id
        );
        let record = api.upload_bundle(app_id, bundle.into_bytes()).await?;
        self.advance(fsm, DeployEvent::Uploaded)?;

        let task = api.trigger_deploy(app_id, record.id).await?;
        info!("Deploying bundle {} as task {}", record.id, task.id);
        self.advance(fsm, DeployEvent::Triggered)?;

        let outcome = wait_for_task(api, &task.id, &self.options, self.clock.as_ref(), &self.cancel).await?;
        self.advance(fsm, DeployEvent::TaskSucceeded)?;

        api.publish_application(app_id, PUBLISH_ACCESS_TYPE).await?;
        self.advance(fsm, DeployEvent::Published)?;

        let config = api.get_application_config(app_id).await?;
        self.advance(fsm, DeployEvent::ConfigFetched)?;

        info!("Deployed application {}: {}", app_id, config.config_url);
        Ok(DeployOutcome {
            app_id,
            config_url: config.config_url,
            task_log: outcome.log,
        })
    }

    fn advance(&self, fsm: &mut DeploymentFsm, event: DeployEvent) -> Result<DeployPhase, PublishError> {
        if self.cancel.is_cancelled() {
            return Err(PublishError::Cancelled);
        }
        fsm.process(event).map_err(PublishError::Internal)
    }
}

/// Open a session with `server`, deploy, and close the session
pub async fn deploy(
    server: &Url,
    api_key: SecretString,
    client_options: &ClientOptions,
    deployer: &Deployer,
    request: DeployRequest,
) -> Result<DeployOutcome, PublishError> {
    let mut api = ConnectClient::open_with(server, api_key, client_options)?;
    deployer.deploy(&mut api, request).await
}
