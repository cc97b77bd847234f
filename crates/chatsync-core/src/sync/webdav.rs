//! WebDAV adapter
//!
//! Stores each snapshot as `<endpoint>/chatsync/<key>.json` using plain
//! GET/PUT with basic auth. The key is percent-encoded as one path segment. `check` issues MKCOL on the folder, which also
//! creates it on first use.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use tracing::{debug, warn};

use super::client::{build_http_client, check_status, route, SyncClient};
use super::error::{SyncError, SyncResult};
use super::state::WebDavConfig;

/// Remote folder holding snapshots
pub const SYNC_FOLDER: &str = "chatsync";

/// Statuses from MKCOL that mean the server is reachable and the folder usable
const REACHABLE_STATUSES: &[u16] = &[200, 201, 301, 302, 307, 308, 405];

/// Client for WebDAV-compatible stores
#[derive(Debug, Clone)]
pub struct WebDavClient {
    http: reqwest::Client,
    config: WebDavConfig,
    proxy: Option<String>,
}

impl WebDavClient {
    /// Create a client; `proxy` routes requests through a relay when set
    pub fn new(config: WebDavConfig, proxy: Option<String>, timeout: Duration) -> SyncResult<Self> {
        let http = build_http_client(timeout, &config.endpoint)?;
        Ok(Self {
            http,
            config,
            proxy,
        })
    }

    /// Snapshot file name for a key
    fn file_name(key: &str) -> String {
        format!("{}.json", key)
    }

    fn url(&self, segments: &[&str]) -> SyncResult<(String, Option<String>)> {
        route(&self.config.endpoint, self.proxy.as_deref(), "webdav", segments)
    }

    fn request(&self, method: Method, segments: &[&str]) -> SyncResult<(String, RequestBuilder)> {
        let (url, endpoint) = self.url(segments)?;
        let mut request = self
            .http
            .request(method, &url)
            .basic_auth(&self.config.username, Some(&self.config.password));
        if let Some(endpoint) = endpoint {
            request = request.query(&[("endpoint", endpoint)]);
        }
        Ok((url, request))
    }

    async fn make_folder(&self) -> SyncResult<StatusCode> {
        let mkcol = Method::from_bytes(b"MKCOL").map_err(|e| SyncError::Transport {
            url: self.config.endpoint.clone(),
            message: e.to_string(),
        })?;
        let (url, request) = self.request(mkcol, &[SYNC_FOLDER, ""])?;
        let response = request
            .send()
            .await
            .map_err(|e| SyncError::transport(&url, e))?;
        Ok(response.status())
    }

    async fn put(&self, key: &str, value: &str) -> SyncResult<StatusCode> {
        let file_name = Self::file_name(key);
        let (url, request) = self.request(Method::PUT, &[SYNC_FOLDER, &file_name])?;
        let response = request
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(value.to_string())
            .send()
            .await
            .map_err(|e| SyncError::transport(&url, e))?;
        Ok(response.status())
    }
}

#[async_trait]
impl SyncClient for WebDavClient {
    async fn get(&self, key: &str) -> SyncResult<String> {
        let file_name = Self::file_name(key);
        let (url, request) = self.request(Method::GET, &[SYNC_FOLDER, &file_name])?;
        debug!("WebDAV GET {}", url);

        let response = request
            .send()
            .await
            .map_err(|e| SyncError::transport(&url, e))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("No remote snapshot at {}", url);
            return Ok(String::new());
        }
        check_status(&url, response.status())?;

        response
            .text()
            .await
            .map_err(|e| SyncError::transport(&url, e))
    }

    async fn set(&self, key: &str, value: &str) -> SyncResult<()> {
        let mut status = self.put(key, value).await?;

        // 409: parent collection missing
        if status == StatusCode::CONFLICT {
            warn!("WebDAV folder missing, creating {}", SYNC_FOLDER);
            self.make_folder().await?;
            status = self.put(key, value).await?;
        }

        let file_name = Self::file_name(key);
        let (url, _) = self.url(&[SYNC_FOLDER, &file_name])?;
        check_status(&url, status)
    }

    async fn check(&self) -> SyncResult<bool> {
        if self.config.endpoint.trim().is_empty() {
            return Ok(false);
        }

        let status = self.make_folder().await?;
        debug!("WebDAV check returned {}", status);
        Ok(REACHABLE_STATUSES.contains(&status.as_u16()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    const BASIC_ALICE: &str = "Basic YWxpY2U6c2VjcmV0";

    fn config(endpoint: String) -> WebDavConfig {
        WebDavConfig {
            endpoint,
            username: "alice".to_string(),
            password: "secret".to_string(),
            ..Default::default()
        }
    }

    fn client(endpoint: String, proxy: Option<String>) -> WebDavClient {
        WebDavClient::new(config(endpoint), proxy, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_get_returns_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/chatsync/alice.json")
                    .header("authorization", BASIC_ALICE);
                then.status(200).body(r#"{"sessions":[]}"#);
            })
            .await;

        let body = client(server.base_url(), None).get("alice").await.unwrap();
        assert_eq!(body, r#"{"sessions":[]}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_not_found_is_empty() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/chatsync/alice.json");
                then.status(404);
            })
            .await;

        let body = client(server.base_url(), None).get("alice").await.unwrap();
        assert_eq!(body, "");
    }

    #[tokio::test]
    async fn test_get_unauthorized_is_auth_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/chatsync/alice.json");
                then.status(401);
            })
            .await;

        let err = client(server.base_url(), None).get("alice").await.unwrap_err();
        assert!(matches!(err, SyncError::Auth { status: 401 }));
    }

    #[tokio::test]
    async fn test_get_server_error_is_transport_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/chatsync/alice.json");
                then.status(500);
            })
            .await;

        let err = client(server.base_url(), None).get("alice").await.unwrap_err();
        assert!(matches!(err, SyncError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_set_puts_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/chatsync/alice.json")
                    .header("authorization", BASIC_ALICE)
                    .body(r#"{"sessions":[]}"#);
                then.status(201);
            })
            .await;

        client(server.base_url(), None)
            .set("alice", r#"{"sessions":[]}"#)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_requests_go_through_proxy() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/proxy/webdav/chatsync/alice.json")
                    .query_param("endpoint", "https://dav.example.com");
                then.status(200).body("{}");
            })
            .await;

        let body = client(
            "https://dav.example.com".to_string(),
            Some(server.url("/proxy")),
        )
        .get("alice")
        .await
        .unwrap();
        assert_eq!(body, "{}");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_key_is_encoded_as_one_segment() {
        let server = MockServer::start_async().await;
        let get = server
            .mock_async(|when, then| {
                when.method(GET).path("/chatsync/team%231.json");
                then.status(200).body("{}");
            })
            .await;
        let put = server
            .mock_async(|when, then| {
                when.method(PUT).path("/chatsync/a%2F..%2Fb%3Fc.json");
                then.status(201);
            })
            .await;

        let client = client(server.base_url(), None);
        assert_eq!(client.get("team#1").await.unwrap(), "{}");
        client.set("a/../b?c", "{}").await.unwrap();
        get.assert_async().await;
        put.assert_async().await;
    }

    #[tokio::test]
    async fn test_set_creates_missing_folder() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/chatsync/alice.json");
                then.status(409);
            })
            .await;
        let folder = server
            .mock_async(|when, then| {
                when.path("/chatsync/");
                then.status(201);
            })
            .await;

        // Folder is created, but the retried PUT still conflicts
        let err = client(server.base_url(), None).set("alice", "{}").await.unwrap_err();
        assert!(matches!(err, SyncError::Transport { .. }));
        folder.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let err = client("http://127.0.0.1:1".to_string(), None)
            .get("alice")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_check_unconfigured_is_false() {
        let client = WebDavClient::new(
            WebDavConfig::default(),
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(!client.check().await.unwrap());
    }
}
