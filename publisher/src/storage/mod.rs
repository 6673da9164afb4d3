//! Local configuration storage

pub mod keys;
pub mod layout;
pub mod settings;
