mod client;
mod config;
mod error;

pub use client::HttpQuizBackend;
pub use config::HttpBackendConfig;
pub use error::{HttpApiError, HttpResult};
