//! Notebook publisher library
//!
//! Bundles notebooks into gzip tarballs with a checksummed manifest and
//! deploys them to a content publishing server.

pub mod app;
pub mod bundle;
pub mod deploy;
pub mod environment;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod mock;
pub mod render;
pub mod server;
pub mod storage;
pub mod utils;
