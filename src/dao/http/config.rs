use std::time::Duration;

use super::error::{HttpApiError, HttpResult};

/// Runtime configuration describing how to reach the quiz REST API.
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// Base URL of the API, e.g. `http://localhost:8000/api`.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Bearer token attached to every request, if the deployment requires one.
    pub auth_token: Option<String>,
}

impl HttpBackendConfig {
    /// Construct a configuration from an explicit base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(10),
            auth_token: None,
        }
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Attach a bearer token to the configuration.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Build a configuration by reading the expected environment variables.
    pub fn from_env() -> HttpResult<Self> {
        let base_url =
            std::env::var("QUIZ_API_BASE_URL").map_err(|_| HttpApiError::MissingEnvVar {
                var: "QUIZ_API_BASE_URL",
            })?;

        let mut config = Self::new(base_url);

        if let Some(token) = std::env::var("QUIZ_API_TOKEN").ok().filter(|t| !t.is_empty()) {
            config = config.with_auth_token(token);
        }

        Ok(config)
    }
}
