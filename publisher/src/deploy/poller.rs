//! Deploy task polling
//!
//! The deadline is an inactivity window: every newly observed status line
//! pushes it back, so a long build that keeps reporting progress never
//! times out.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use connect_models::{TaskId, TaskRecord};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::PublishError;
use crate::http::api::ConnectApi;

/// Poller options
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// How long the task may go without reporting a new status
    pub inactivity_timeout: Duration,

    /// Delay between polls
    pub interval: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            inactivity_timeout: Duration::from_secs(600),
            interval: Duration::from_secs(1),
        }
    }
}

/// Time source and sleeper for the poll loop
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await
    }
}

/// Finished task together with every status line seen while polling
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task: TaskRecord,
    pub log: Vec<String>,
}

/// Poll `task_id` until it finishes successfully
///
/// Fails with `Timeout` when no new status arrives within the inactivity
/// window, `DeployFailed` when the task ends with a non-zero code, and
/// `Cancelled` as soon as `cancel` fires, even mid-request.
pub async fn wait_for_task<A, C>(
    api: &mut A,
    task_id: &TaskId,
    options: &PollOptions,
    clock: &C,
    cancel: &CancellationToken,
) -> Result<TaskOutcome, PublishError>
where
    A: ConnectApi + ?Sized,
    C: Clock + ?Sized,
{
    let mut last_status: Option<u64> = None;
    let mut log: Vec<String> = Vec::new();
    let mut deadline = clock.now() + options.inactivity_timeout;

    while clock.now() < deadline {
        if cancel.is_cancelled() {
            return Err(PublishError::Cancelled);
        }

        let task = tokio::select! {
            _ = cancel.cancelled() => return Err(PublishError::Cancelled),
            task = api.get_task(task_id, last_status) => task?,
        };

        if Some(task.last_status) != last_status {
            for line in &task.status {
                info!("Deployment status: {}", line);
            }
            log.extend(task.status.iter().cloned());
            deadline = clock.now() + options.inactivity_timeout;
            last_status = Some(task.last_status);
        }

        if task.finished {
            if task.code != 0 {
                let detail = if task.error.is_empty() {
                    format!("task {} exited with code {}", task.id, task.code)
                } else {
                    task.error.clone()
                };
                return Err(PublishError::DeployFailed(detail));
            }
            debug!("Task {} finished", task.id);
            return Ok(TaskOutcome { task, log });
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(PublishError::Cancelled),
            _ = clock.sleep(options.interval) => {}
        }
    }

    Err(PublishError::Timeout(format!(
        "no progress from task {} in {:?}",
        task_id, options.inactivity_timeout
    )))
}
