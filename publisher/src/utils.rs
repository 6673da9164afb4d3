//! Utility functions

use serde::{Deserialize, Serialize};

/// Version information for the publisher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Application name derived from a notebook title
///
/// Server side names are restricted to ASCII letters, digits, `-` and `_`,
/// between 3 and 64 characters.
pub fn app_name_for(title: &str) -> String {
    let mut name: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    name.truncate(64);
    while name.len() < 3 {
        name.push('_');
    }
    name
}
