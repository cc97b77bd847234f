//! Remote store client protocol
//!
//! Every remote store is reached through [`SyncClient`]: fetch a payload,
//! replace a payload, check reachability. [`HttpClientFactory`] maps the
//! configured [`BackendKind`] to the concrete adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};

use super::error::{SyncError, SyncResult};
use super::state::{BackendKind, SyncConfig};
use super::upstash::UpstashClient;
use super::webdav::WebDavClient;

/// Uniform capability interface for remote stores
#[async_trait]
pub trait SyncClient: Send + Sync {
    /// Fetch the raw payload stored under `key`
    ///
    /// Returns an empty string when the remote object does not exist.
    async fn get(&self, key: &str) -> SyncResult<String>;

    /// Create or replace the remote object at `key`
    ///
    /// Overwrites are idempotent, so callers may retry.
    async fn set(&self, key: &str, value: &str) -> SyncResult<()>;

    /// Lightweight reachability and credential check
    ///
    /// Returns `false` when not configured, rejected, or unreachable by
    /// status; errors only on transport failures.
    async fn check(&self) -> SyncResult<bool>;
}

/// Builds the client for the configured provider
pub trait ClientFactory: Send + Sync {
    fn create(&self, config: &SyncConfig) -> SyncResult<Box<dyn SyncClient>>;
}

/// Factory for the HTTP-backed adapters
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    timeout: Duration,
}

impl HttpClientFactory {
    /// Create a factory whose clients abort requests after `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpClientFactory {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl ClientFactory for HttpClientFactory {
    fn create(&self, config: &SyncConfig) -> SyncResult<Box<dyn SyncClient>> {
        let proxy = config.proxy().map(str::to_string);
        let client: Box<dyn SyncClient> = match config.provider {
            BackendKind::WebDav => Box::new(WebDavClient::new(
                config.webdav.clone(),
                proxy,
                self.timeout,
            )?),
            BackendKind::Upstash => Box::new(UpstashClient::new(
                config.upstash.clone(),
                proxy,
                self.timeout,
            )?),
        };
        Ok(client)
    }
}

/// Build the shared HTTP client used by an adapter
pub(crate) fn build_http_client(timeout: Duration, endpoint: &str) -> SyncResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("chatsync/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| SyncError::transport(endpoint, e))
}

/// Map a non-success HTTP status to the sync error taxonomy
pub(crate) fn check_status(url: &str, status: StatusCode) -> SyncResult<()> {
    if status.is_success() {
        return Ok(());
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SyncError::Auth {
            status: status.as_u16(),
        }),
        _ => Err(SyncError::Transport {
            url: url.to_string(),
            message: format!("unexpected response status {}", status),
        }),
    }
}

/// Resolve a request URL, routing through a proxy when one is configured
///
/// Each of `segments` becomes exactly one percent-encoded path segment, so
/// keys containing `/`, `#`, `?` or `%` cannot escape their slot. Proxied
/// requests go to `<proxy>/<service>/<segments..>` and carry the real
/// endpoint as the `endpoint` query parameter.
pub(crate) fn route(
    endpoint: &str,
    proxy: Option<&str>,
    service: &str,
    segments: &[&str],
) -> SyncResult<(String, Option<String>)> {
    let endpoint = endpoint.trim().trim_end_matches('/');
    let (base, forwarded) = match proxy {
        Some(proxy) => (proxy.trim(), Some(endpoint.to_string())),
        None => (endpoint, None),
    };

    let invalid = |message: String| SyncError::Transport {
        url: base.to_string(),
        message,
    };
    let mut url = Url::parse(base).map_err(|e| invalid(format!("invalid URL: {}", e)))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| invalid("URL cannot carry a path".to_string()))?;
        path.pop_if_empty();
        if forwarded.is_some() {
            path.push(service);
        }
        path.extend(segments);
    }

    Ok((url.into(), forwarded))
}
