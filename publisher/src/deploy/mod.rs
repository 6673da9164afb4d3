//! Deploy protocol

pub mod fsm;
pub mod orchestrator;
pub mod poller;
pub mod search;

pub use orchestrator::{deploy, DeployOutcome, DeployRequest, Deployer};
pub use poller::{Clock, PollOptions, TokioClock};
