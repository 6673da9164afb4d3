//! Wire models for the content publishing server API
//!
//! Every type here mirrors a JSON body sent to or received from
//! `/__api__/...` on the publishing server.

pub mod models;

pub use models::*;
