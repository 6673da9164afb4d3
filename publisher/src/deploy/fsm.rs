//! Finite State Machine for the deploy protocol

use serde::{Deserialize, Serialize};

/// Deploy phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployPhase {
    /// Nothing sent yet
    Pending,

    /// Creating or fetching the application record
    Resolving,

    /// Bringing the application title in line with the request
    ReconcilingTitle,

    /// Sending the bundle bytes
    Uploading,

    /// Asking the server to deploy the uploaded bundle
    Triggering,

    /// Waiting for the deploy task to finish
    Polling,

    /// Setting the access type
    Publishing,

    /// Fetching the configuration URL
    FetchingConfig,

    /// Deployed and published
    Completed,

    /// Stopped by an error
    Failed,
}

impl DeployPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeployPhase::Completed | DeployPhase::Failed)
    }
}

/// Deploy event
#[derive(Debug, Clone)]
pub enum DeployEvent {
    /// Start resolving the application
    Start,

    /// Application record obtained
    Resolved,

    /// Title matches the request
    TitleReconciled,

    /// Bundle record created
    Uploaded,

    /// Deploy task created
    Triggered,

    /// Task finished with code 0
    TaskSucceeded,

    /// Access type set
    Published,

    /// Configuration URL obtained
    ConfigFetched,

    /// Any step failed
    Fail(String),
}

/// Deploy FSM; phases only move forward
#[derive(Debug, Clone)]
pub struct DeploymentFsm {
    phase: DeployPhase,
    failed_in: Option<DeployPhase>,
    error: Option<String>,
}

impl DeploymentFsm {
    /// Create a new FSM in pending phase
    pub fn new() -> Self {
        Self {
            phase: DeployPhase::Pending,
            failed_in: None,
            error: None,
        }
    }

    /// Get current phase
    pub fn phase(&self) -> DeployPhase {
        self.phase
    }

    /// Phase that was active when the deploy failed
    pub fn failed_in(&self) -> Option<DeployPhase> {
        self.failed_in
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition phase
    pub fn process(&mut self, event: DeployEvent) -> Result<DeployPhase, String> {
        use DeployEvent as E;
        use DeployPhase as P;

        let next = match (self.phase, &event) {
            (P::Pending, E::Start) => P::Resolving,
            (P::Resolving, E::Resolved) => P::ReconcilingTitle,
            (P::ReconcilingTitle, E::TitleReconciled) => P::Uploading,
            (P::Uploading, E::Uploaded) => P::Triggering,
            (P::Triggering, E::Triggered) => P::Polling,
            (P::Polling, E::TaskSucceeded) => P::Publishing,
            (P::Publishing, E::Published) => P::FetchingConfig,
            (P::FetchingConfig, E::ConfigFetched) => P::Completed,

            (phase, E::Fail(err)) if !phase.is_terminal() => {
                self.failed_in = Some(phase);
                self.error = Some(err.clone());
                P::Failed
            }

            // Invalid transitions
            (phase, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", phase, event));
            }
        };

        self.phase = next;
        Ok(next)
    }
}

impl Default for DeploymentFsm {
    fn default() -> Self {
        Self::new()
    }
}
