//! Process-wide settings, built once at startup and passed to every step.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::poll::Backoff;

pub const API_KEY_VAR: &str = "GEMINI_API_KEY";
pub const STORE_NAME_VAR: &str = "STORE_NAME";
pub const MODEL_VAR: &str = "MODEL";
pub const UPLOAD_PATH_VAR: &str = "UPLOAD_PATH";
pub const API_BASE_URL_VAR: &str = "GEMINI_API_BASE_URL";
pub const POLL_TIMEOUT_VAR: &str = "POLL_TIMEOUT_SECS";

pub const DEFAULT_STORE_NAME: &str = "demo-file-store";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_UPLOAD_PATH: &str = "data";
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(600);

const REDACTED: &str = "********************";

/// Wait schedules for the asynchronous remote transitions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollingSettings {
    /// Uploaded file leaving the processing state.
    pub file: Backoff,
    /// Import operation reporting done.
    pub operation: Backoff,
    /// Pause after each forced delete so it propagates before the import.
    pub delete_propagation: Duration,
}

impl PollingSettings {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            file: Backoff::new(Duration::from_secs(2), Duration::from_secs(30), timeout),
            operation: Backoff::new(Duration::from_secs(5), Duration::from_secs(60), timeout),
            delete_propagation: Duration::from_secs(2),
        }
    }
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_POLL_TIMEOUT)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_key: Option<String>,
    pub store_name: String,
    pub model: String,
    pub upload_path: PathBuf,
    pub api_base_url: String,
    pub polling: PollingSettings,
    /// Raw `POLL_TIMEOUT_SECS` value that could not be parsed.
    pub invalid_poll_timeout: Option<String>,
}

impl Settings {
    /// Build settings from any key lookup; empty values count as unset.
    ///
    /// A malformed poll timeout falls back to the default and is kept in
    /// `invalid_poll_timeout` so the status report can flag it.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut invalid_poll_timeout = None;
        let timeout = match get(POLL_TIMEOUT_VAR) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) => Duration::from_secs(secs),
                Err(e) => {
                    warn!(
                        var = POLL_TIMEOUT_VAR,
                        value = %raw,
                        error = %e,
                        default_secs = DEFAULT_POLL_TIMEOUT.as_secs(),
                        "Invalid poll timeout, using default"
                    );
                    invalid_poll_timeout = Some(raw);
                    DEFAULT_POLL_TIMEOUT
                }
            },
            None => DEFAULT_POLL_TIMEOUT,
        };

        let settings = Settings {
            api_key: get(API_KEY_VAR),
            store_name: get(STORE_NAME_VAR).unwrap_or_else(|| DEFAULT_STORE_NAME.to_string()),
            model: get(MODEL_VAR).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            upload_path: get(UPLOAD_PATH_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_PATH)),
            api_base_url: get(API_BASE_URL_VAR)
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            polling: PollingSettings::with_timeout(timeout),
            invalid_poll_timeout,
        };
        settings.trace_loaded();
        settings
    }

    pub fn trace_loaded(&self) {
        info!(
            api_key_set = self.api_key.is_some(),
            store_name = %self.store_name,
            model = %self.model,
            upload_path = %self.upload_path.display(),
            "Loaded settings"
        );
        debug!(api_base_url = %self.api_base_url, polling = ?self.polling, "Settings (details)");
    }

    /// The API key, or a configuration error naming the variable to set.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            Error::Configuration(format!(
                "{API_KEY_VAR} environment variable not set. Please check your .env file."
            ))
        })
    }

    /// Printable summary of every value, with the API key redacted.
    pub fn status_report(&self) -> String {
        let rule = "=".repeat(80);
        let mut out = String::new();
        let _ = writeln!(out, "Environment Configuration:");
        let _ = writeln!(out, "{rule}");
        match self.api_key {
            Some(_) => {
                let _ = writeln!(out, "✓ {API_KEY_VAR}: {REDACTED} (loaded)");
            }
            None => {
                let _ = writeln!(out, "✗ {API_KEY_VAR}: Not set");
            }
        }
        let _ = writeln!(out, "✓ {STORE_NAME_VAR}: {}", self.store_name);
        let _ = writeln!(out, "✓ {MODEL_VAR}: {}", self.model);
        let _ = writeln!(out, "✓ {UPLOAD_PATH_VAR}: {}", self.upload_path.display());
        if let Some(raw) = &self.invalid_poll_timeout {
            let _ = writeln!(
                out,
                "✗ {POLL_TIMEOUT_VAR}: invalid value {raw:?}, using default {}s",
                DEFAULT_POLL_TIMEOUT.as_secs()
            );
        }
        let _ = write!(out, "{rule}");
        out
    }
}
