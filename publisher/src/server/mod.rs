//! Extension endpoint server
//!
//! Exposes the publish actions to the notebook front end as
//! `POST /nbpublish/{action}` with a JSON body per action.

pub mod handlers;
pub mod serve;
pub mod state;

pub use serve::{router, serve};
pub use state::ServerState;
