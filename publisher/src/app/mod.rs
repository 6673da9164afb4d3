//! Endpoint application wiring

pub mod options;
pub mod run;
