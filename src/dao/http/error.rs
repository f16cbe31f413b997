//! Error types for the HTTP quiz API client.

use reqwest::StatusCode;
use thiserror::Error;

use crate::dao::backend::BackendError;

/// Convenient result alias returning [`HttpApiError`] failures.
pub type HttpResult<T> = Result<T, HttpApiError>;

/// Failures that can occur while talking to the quiz REST API.
#[derive(Debug, Error)]
pub enum HttpApiError {
    /// Required environment variable is missing.
    #[error("missing quiz API environment variable `{var}`")]
    MissingEnvVar {
        /// Name of the missing variable.
        var: &'static str,
    },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build quiz API client")]
    ClientBuilder {
        /// Underlying builder failure.
        #[source]
        source: reqwest::Error,
    },
    /// A request could not be sent.
    #[error("failed to send quiz API request to `{path}`")]
    RequestSend {
        /// Request path relative to the base URL.
        path: String,
        /// Underlying transport failure.
        #[source]
        source: reqwest::Error,
    },
    /// The API returned an unexpected status code.
    #[error("unexpected quiz API response status {status} for `{path}`")]
    RequestStatus {
        /// Request path relative to the base URL.
        path: String,
        /// Status code the API answered with.
        status: StatusCode,
    },
    /// Response payload could not be parsed into JSON.
    #[error("failed to decode quiz API response for `{path}`")]
    DecodeResponse {
        /// Request path relative to the base URL.
        path: String,
        /// Underlying decode failure.
        #[source]
        source: reqwest::Error,
    },
}

impl From<HttpApiError> for BackendError {
    fn from(err: HttpApiError) -> Self {
        BackendError::unavailable(err.to_string(), err)
    }
}
