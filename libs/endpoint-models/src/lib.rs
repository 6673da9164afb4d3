//! Request and response models for the notebook host extension endpoint

pub mod models;

pub use models::*;
