//! Application search for the publish dialog
//!
//! Lists applications the caller can edit whose title starts with the
//! notebook title, restricted to notebook content modes, each with its
//! configuration URL.

use connect_models::{AppId, AppMode, Application};
use endpoint_models::AppSearchEntry;
use tracing::warn;

use crate::errors::PublishError;
use crate::http::api::{AppFilters, ConnectApi};

/// Number of search results requested from the server
pub const SEARCH_COUNT: u32 = 5;

/// Search applications matching `title`
///
/// When `previous_app_id` is given but not among the matches, it is fetched
/// directly and offered as well; failing to fetch it is logged and skipped.
pub async fn app_search<A>(
    api: &mut A,
    title: &str,
    previous_app_id: Option<AppId>,
) -> Result<Vec<AppSearchEntry>, PublishError>
where
    A: ConnectApi + ?Sized,
{
    let filters = AppFilters {
        search: Some(title.to_string()),
        count: SEARCH_COUNT,
        ..Default::default()
    };

    let mut entries = Vec::new();
    let mut found = false;

    for app in api.find_applications(&filters).await? {
        if app.mode().is_some() {
            found |= Some(app.id) == previous_app_id;
            entries.push(entry_for(api, &app).await?);
        }
    }

    if let (Some(app_id), false) = (previous_app_id, found) {
        match api.get_application(app_id).await {
            Ok(app) if app.mode().is_some() => entries.push(entry_for(api, &app).await?),
            Ok(_) => {}
            Err(e) => warn!(
                "Error getting info for previous app_id \"{}\", skipping: {}",
                app_id, e
            ),
        }
    }

    Ok(entries)
}

async fn entry_for<A>(api: &mut A, app: &Application) -> Result<AppSearchEntry, PublishError>
where
    A: ConnectApi + ?Sized,
{
    let config = api.get_application_config(app.id).await?;
    Ok(AppSearchEntry {
        id: app.id,
        name: app.name.clone(),
        title: app.title.clone(),
        app_mode: app.mode().map(|mode: AppMode| mode.as_str().to_string()),
        config_url: config.config_url,
    })
}
