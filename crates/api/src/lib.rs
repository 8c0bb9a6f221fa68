//! SHM backend API client.
//!
//! This crate provides a lightweight client for the SHM `object.cgi`
//! endpoint. It focuses on:
//!
//! - Constructing an HTTP client with sensible defaults
//! - Validating `SHM_API_BASE` before any request is made
//! - Building requests with a consistent User-Agent and Accept header
//! - Fetching the session's permitted menu through [`MenuSource`]
//!
//! # Example
//!
//! ```ignore
//! use shm_api::{MenuSource, ShmClient};
//! use shm_types::SessionToken;
//!
//! async fn show() -> anyhow::Result<()> {
//!     let client = ShmClient::new_from_env()?;
//!     let menu = client.fetch_menu(&SessionToken::new("abc")).await?;
//!     println!("{:?}", menu.menu);
//!     Ok(())
//! }
//! ```

use std::env;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, header};
use shm_util::redact_sensitive;
use thiserror::Error;
use tracing::debug;
use url::Url;

mod menu;

pub use menu::*;

/// Environment variable overriding the backend base URL.
pub const SHM_API_BASE_ENV: &str = "SHM_API_BASE";

/// Base URL used when `SHM_API_BASE` is unset; the admin panel is served by
/// the same host as the backend.
pub const DEFAULT_API_BASE: &str = "http://localhost";

/// Errors raised while configuring a [`ShmClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid SHM_API_BASE URL '{base}': {reason}")]
    InvalidBaseUrl { base: String, reason: String },
    #[error("build http client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Thin wrapper around a configured `reqwest::Client` for SHM backend access.
#[derive(Debug, Clone)]
pub struct ShmClient {
    pub base_url: String,
    pub http: Client,
    pub user_agent: String,
}

impl ShmClient {
    /// Construct a client for the given base URL.
    ///
    /// The client has no total request timeout; see [`ShmClient::with_timeout`].
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url = validate_base_url(base_url)?;
        Ok(Self {
            base_url,
            http: build_http_client(None)?,
            user_agent: format!("shm-admin/{}; {}", env!("CARGO_PKG_VERSION"), env::consts::OS),
        })
    }

    /// Construct a client from `SHM_API_BASE`, falling back to [`DEFAULT_API_BASE`].
    pub fn new_from_env() -> Result<Self, ClientError> {
        let base_url = env::var(SHM_API_BASE_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        Self::new(&base_url)
    }

    /// Rebuild the underlying client with a total per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ClientError> {
        self.http = build_http_client(Some(timeout))?;
        Ok(self)
    }

    /// Build a `reqwest::RequestBuilder` for a method and a path relative to
    /// `self.base_url`. The path is appended as-is.
    pub fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %redact_sensitive(&url), "building request");

        self.http
            .request(method, url)
            .header(header::USER_AGENT, &self.user_agent)
    }
}

fn build_http_client(timeout: Option<Duration>) -> Result<Client, reqwest::Error> {
    let mut default_headers = header::HeaderMap::new();
    default_headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

    let mut builder = Client::builder().default_headers(default_headers);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build()
}

/// Validate a base URL and return it without trailing slashes.
///
/// Rules:
/// - must parse as an absolute URL with a host
/// - scheme must be `http` or `https`
/// - no query or fragment, since request paths are appended to it
fn validate_base_url(base: &str) -> Result<String, ClientError> {
    let invalid = |reason: String| ClientError::InvalidBaseUrl {
        base: base.to_string(),
        reason,
    };
    let trimmed = base.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed).map_err(|error| invalid(error.to_string()))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".into()));
    }
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(invalid("must not carry a query or fragment".into()));
    }

    Ok(trimmed.to_string())
}
