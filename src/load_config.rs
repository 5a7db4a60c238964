use anyhow::{Context, Result};
use file_search_core::config::{Settings, API_KEY_VAR};
use tracing::{error, info, warn};

/// Loads `.env` (if present) and builds [`Settings`] from the process environment.
///
/// A missing API key is not an error here: `setup` reports it, and every step
/// that talks to the API refuses to start without it.
pub fn load_settings() -> Result<Settings> {
    match dotenvy::dotenv() {
        Ok(path) => info!(env_file = %path.display(), "Loaded .env file"),
        Err(e) if e.not_found() => info!("No .env file found, using process environment"),
        Err(e) => {
            error!(error = ?e, "Failed to parse .env file");
            return Err(e).context("Failed to load .env file");
        }
    }
    Ok(settings_from_env())
}

/// Builds [`Settings`] from the process environment only.
///
/// Never fails: bad values fall back to defaults and show up in the status report.
pub fn settings_from_env() -> Settings {
    let settings = Settings::from_lookup(|key| std::env::var(key).ok());

    if settings.api_key.is_none() {
        warn!(var = API_KEY_VAR, "API key environment variable not set");
    }
    settings
}
