//! Publishing server client

pub mod api;
pub mod client;
pub mod verify;

pub use api::{AppFilters, ConnectApi};
pub use client::{ClientOptions, ConnectClient};
