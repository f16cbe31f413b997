//! Application-level configuration loading for the attempt runner.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the runner looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "ATTEMPT_ENGINE_CONFIG_PATH";
/// Default base URL of the quiz REST API.
const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";
/// Default trailing-edge autosave window in milliseconds.
const DEFAULT_AUTOSAVE_WINDOW_MS: u64 = 1_000;
/// Default per-request HTTP timeout in milliseconds.
const DEFAULT_HTTP_TIMEOUT_MS: u64 = 10_000;
/// Default path of the local draft file.
const DEFAULT_DRAFT_PATH: &str = "drafts.json";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    base_url: String,
    autosave_window_ms: u64,
    http_timeout_ms: u64,
    draft_path: PathBuf,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to
    /// baked-in defaults when the file is absent or unreadable.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        base_url = %config.base_url,
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Base URL of the quiz REST API. `QUIZ_API_BASE_URL` overrides the
    /// configured value.
    pub fn base_url(&self) -> String {
        env::var("QUIZ_API_BASE_URL")
            .ok()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| self.base_url.clone())
    }

    /// Trailing-edge window applied to background answer saves.
    pub fn autosave_window(&self) -> Duration {
        Duration::from_millis(self.autosave_window_ms)
    }

    /// Per-request HTTP timeout.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    /// Path of the local draft file.
    pub fn draft_path(&self) -> PathBuf {
        self.draft_path.clone()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            autosave_window_ms: DEFAULT_AUTOSAVE_WINDOW_MS,
            http_timeout_ms: DEFAULT_HTTP_TIMEOUT_MS,
            draft_path: PathBuf::from(DEFAULT_DRAFT_PATH),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    base_url: Option<String>,
    autosave_window_ms: Option<u64>,
    http_timeout_ms: Option<u64>,
    draft_path: Option<PathBuf>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            base_url: value.base_url.unwrap_or(defaults.base_url),
            autosave_window_ms: value
                .autosave_window_ms
                .unwrap_or(defaults.autosave_window_ms),
            http_timeout_ms: value.http_timeout_ms.unwrap_or(defaults.http_timeout_ms),
            draft_path: value.draft_path.unwrap_or(defaults.draft_path),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
