//! Hosted key-value adapter (Upstash REST API)
//!
//! The snapshot for namespace `ns` is split into chunks stored under
//! `ns-chunk-0`, `ns-chunk-1`, ... with the chunk count under
//! `ns-chunk-count`. Requests use bearer auth with the configured API key.
//!
//! REST dialect (keys are percent-encoded as one path segment):
//! - `GET  <endpoint>/get/<key>` -> `{"result": "<value>" | null}`
//! - `POST <endpoint>/set/<key>` with the value as body -> `{"result": "OK"}`
//!
//! A write overwrites chunks in place and updates the count last. The store
//! has no multi-key transaction here, so a reader racing a writer can join
//! chunks from two different snapshots; the result fails to parse and the
//! sync reports `CorruptRemoteState` rather than merging it. A shorter
//! snapshot leaves the old tail chunks behind. They are never read, since
//! reads stop at the count, and the next longer write overwrites them.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::client::{build_http_client, check_status, route, SyncClient};
use super::error::{SyncError, SyncResult};
use super::state::UpstashConfig;

/// Largest chunk written in one request, in bytes
pub const CHUNK_SIZE: usize = 256 * 1024;

#[derive(Debug, Deserialize)]
struct UpstashResponse {
    #[serde(default)]
    result: Value,
}

/// Client for the Upstash REST API
#[derive(Debug, Clone)]
pub struct UpstashClient {
    http: reqwest::Client,
    config: UpstashConfig,
    proxy: Option<String>,
    chunk_size: usize,
}

impl UpstashClient {
    pub fn new(config: UpstashConfig, proxy: Option<String>, timeout: Duration) -> SyncResult<Self> {
        let http = build_http_client(timeout, &config.endpoint)?;
        Ok(Self {
            http,
            config,
            proxy,
            chunk_size: CHUNK_SIZE,
        })
    }

    /// Override the chunk size (must be non-zero)
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    fn chunk_count_key(key: &str) -> String {
        format!("{}-chunk-count", key)
    }

    fn chunk_key(key: &str, index: usize) -> String {
        format!("{}-chunk-{}", key, index)
    }

    fn request(&self, method: Method, segments: &[&str]) -> SyncResult<(String, RequestBuilder)> {
        let (url, endpoint) =
            route(&self.config.endpoint, self.proxy.as_deref(), "upstash", segments)?;
        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(&self.config.api_key);
        if let Some(endpoint) = endpoint {
            request = request.query(&[("endpoint", endpoint)]);
        }
        Ok((url, request))
    }

    /// Read one key; `None` when absent
    async fn read(&self, key: &str) -> SyncResult<Option<String>> {
        let (url, request) = self.request(Method::GET, &["get", key])?;
        let response = request
            .send()
            .await
            .map_err(|e| SyncError::transport(&url, e))?;
        check_status(&url, response.status())?;

        let body: UpstashResponse = response
            .json()
            .await
            .map_err(|e| SyncError::transport(&url, e))?;
        Ok(match body.result {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
    }

    async fn write(&self, key: &str, value: &str) -> SyncResult<()> {
        let (url, request) = self.request(Method::POST, &["set", key])?;
        let response = request
            .body(value.to_string())
            .send()
            .await
            .map_err(|e| SyncError::transport(&url, e))?;
        check_status(&url, response.status())
    }
}

#[async_trait]
impl SyncClient for UpstashClient {
    async fn get(&self, key: &str) -> SyncResult<String> {
        let Some(count) = self.read(&Self::chunk_count_key(key)).await? else {
            debug!("No remote snapshot under namespace {}", key);
            return Ok(String::new());
        };
        let count: usize = count.trim().parse().map_err(|_| {
            SyncError::CorruptRemoteState(format!("invalid chunk count '{}'", count))
        })?;

        let mut payload = String::new();
        for index in 0..count {
            let chunk = self
                .read(&Self::chunk_key(key, index))
                .await?
                .ok_or_else(|| {
                    SyncError::CorruptRemoteState(format!(
                        "chunk {} of {} missing for {}",
                        index, count, key
                    ))
                })?;
            payload.push_str(&chunk);
        }
        debug!("Read {} chunk(s) for {}", count, key);
        Ok(payload)
    }

    async fn set(&self, key: &str, value: &str) -> SyncResult<()> {
        let chunks = split_chunks(value, self.chunk_size);
        for (index, chunk) in chunks.iter().enumerate() {
            self.write(&Self::chunk_key(key, index), chunk).await?;
        }
        // Count last, so readers never see a count ahead of its chunks
        self.write(&Self::chunk_count_key(key), &chunks.len().to_string())
            .await?;
        debug!("Wrote {} chunk(s) for {}", chunks.len(), key);
        Ok(())
    }

    async fn check(&self) -> SyncResult<bool> {
        if self.config.endpoint.trim().is_empty() || self.config.api_key.trim().is_empty() {
            return Ok(false);
        }

        let namespace = self.config.username.as_str();
        let (url, request) = self.request(Method::GET, &["get", namespace])?;
        let response = request
            .send()
            .await
            .map_err(|e| SyncError::transport(&url, e))?;
        debug!("Upstash check returned {}", response.status());
        Ok(response.status().is_success())
    }
}

/// Split `value` into pieces of at most `size` bytes on char boundaries
fn split_chunks(value: &str, size: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = value;
    while !rest.is_empty() {
        let mut end = size.min(rest.len());
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            end = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }
        let (chunk, tail) = rest.split_at(end);
        chunks.push(chunk);
        rest = tail;
    }
    chunks
}
