//! Server verification
//!
//! Confirms an address points at a publishing server by fetching its
//! settings document, following redirects by hand so the canonical address
//! can be reported back.

use std::time::Duration;

use http::header;
use reqwest::redirect::Policy;
use reqwest::Client;
use tracing::{error, warn};
use url::Url;

use crate::errors::PublishError;

pub const SETTINGS_PATH: &str = "__api__/server_settings";
pub const MAX_REDIRECTS: u32 = 5;

/// Resolve the canonical address of a publishing server
///
/// Returns `Ok(None)` when the address does not answer like a publishing
/// server; only a malformed address is an error.
pub async fn verify_server(server_address: &str) -> Result<Option<String>, PublishError> {
    let base = Url::parse(server_address)?;
    let settings_url = base.join(SETTINGS_PATH)?;

    let client = Client::builder()
        .redirect(Policy::none())
        .timeout(Duration::from_secs(10))
        .build()?;

    let Some(final_url) = follow(&client, settings_url, MAX_REDIRECTS).await else {
        return Ok(None);
    };

    let address = final_url.as_str();
    Ok(Some(
        address
            .strip_suffix(SETTINGS_PATH)
            .unwrap_or(address)
            .to_string(),
    ))
}

async fn follow(client: &Client, mut url: Url, max_redirects: u32) -> Option<Url> {
    let mut remaining = max_redirects;

    loop {
        let response = match client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Error connecting to server: {}", e);
                return None;
            }
        };

        let status = response.status();
        if status.as_u16() >= 400 {
            error!("Response from server: {}", status);
            return None;
        }

        if status.is_redirection() {
            let target = response
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|location| url.join(location).ok());
            let Some(target) = target else {
                error!("Redirect from {} without a usable Location", url);
                return None;
            };
            warn!("Redirected to: {}", target);

            if remaining == 0 {
                error!("Too many redirects");
                return None;
            }
            remaining -= 1;
            url = target;
            continue;
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !content_type.starts_with("application/json") {
            error!("Unexpected Content-Type {} from {}", content_type, url);
            return None;
        }

        return Some(url);
    }
}

/// Stable key for remembering per-server settings in the front end
pub fn address_hash(server_address: &str) -> String {
    crate::bundle::checksum::checksum(server_address.as_bytes())
}
