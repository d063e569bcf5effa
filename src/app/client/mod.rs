//! HTTP client for the update service
//!
//! The module is organized into specialized components:
//! - `config`: HTTP client configuration and building
//! - `http`: endpoint URLs and the shared GET helper
//! - `sink`: the body sinks every transfer is pumped into
//! - `download`: single-item downloads streamed to disk
//!
//! Manifest parsing lives in [`crate::app::manifest`]; [`UpdateClient`] ties
//! both request kinds to one configured endpoint.

use std::path::Path;

use tracing::info;

use crate::app::manifest::{ManifestEntry, ManifestHandler};
use crate::errors::{DownloadError, DownloadResult, ManifestError, ManifestResult};

pub mod config;
pub mod download;
pub mod http;
pub mod sink;

pub use config::ClientConfig;
pub use http::ServiceEndpoint;

pub use download::TransferResult;

use download::DownloadHandler;
use http::HttpHandler;

/// Client for one update service endpoint (URL, API key, platform)
///
/// Requests are issued one at a time by the caller and are never retried.
#[derive(Debug, Clone)]
pub struct UpdateClient {
    http_handler: HttpHandler,
    endpoint: ServiceEndpoint,
    config: ClientConfig,
}

impl UpdateClient {
    /// Create a client for `endpoint`
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::Http` if the HTTP client cannot be built
    pub fn new(endpoint: ServiceEndpoint, config: ClientConfig) -> ManifestResult<Self> {
        let client = config.build_http_client()?;
        info!("Update service: {}", endpoint.base_url());

        Ok(Self {
            http_handler: HttpHandler::new(client),
            endpoint,
            config,
        })
    }

    /// Fetch the manifest for this endpoint's key and platform
    pub async fn fetch_manifest(&self) -> ManifestResult<Vec<ManifestEntry>> {
        let url = self
            .endpoint
            .list_url()
            .map_err(|e| ManifestError::InvalidUrl {
                url: self.endpoint.base_url().to_string(),
                error: e.to_string(),
            })?;

        ManifestHandler::new(
            &self.http_handler,
            self.config.request_timeout,
            self.config.chunk_timeout,
        )
        .fetch(&url)
        .await
    }

    /// Download `item` into `destination`, overwriting it
    ///
    /// `on_progress` is called with the cumulative byte count after every
    /// chunk.
    pub async fn download_file<F>(
        &self,
        item: &str,
        destination: &Path,
        on_progress: F,
    ) -> DownloadResult<TransferResult>
    where
        F: FnMut(u64),
    {
        let url = self
            .endpoint
            .download_url(item)
            .map_err(|e| DownloadError::InvalidUrl {
                url: self.endpoint.base_url().to_string(),
                error: e.to_string(),
            })?;

        DownloadHandler::new(&self.http_handler, self.config.chunk_timeout)
            .download_file(&url, destination, on_progress)
            .await
    }

    /// The endpoint this client talks to
    pub fn endpoint(&self) -> &ServiceEndpoint {
        &self.endpoint
    }

    /// The client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> UpdateClient {
        let endpoint = ServiceEndpoint::new(&server.uri(), "k", "lin").unwrap();
        let config = ClientConfig {
            chunk_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        UpdateClient::new(endpoint, config).unwrap()
    }

    #[tokio::test]
    async fn test_download_writes_body_and_reports_progress() {
        let server = MockServer::start().await;
        let body: Vec<u8> = (0..100_000u32).map(|i| (i % 7) as u8).collect();
        Mock::given(method("GET"))
            .and(path("/api/download"))
            .and(query_param("item", "sub/b.bin"))
            .and(query_param("key", "k"))
            .and(query_param("os", "lin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("b.bin");
        let client = client_for(&server).await;

        let mut progress = Vec::new();
        let transfer = client
            .download_file("sub/b.bin", &destination, |n| progress.push(n))
            .await
            .unwrap();
        let total = transfer.bytes;

        assert_eq!(total, body.len() as u64);
        assert_eq!(transfer.hash, crate::app::hash::Sha1Hash::digest(&body));
        assert_eq!(tokio::fs::read(&destination).await.unwrap(), body);
        assert!(!progress.is_empty());
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(progress.last().copied(), Some(total));
    }

    #[tokio::test]
    async fn test_download_overwrites_existing_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/download"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".to_vec()))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("a.txt");
        tokio::fs::write(&destination, b"much older content").await.unwrap();

        let client = client_for(&server).await;
        client.download_file("a.txt", &destination, |_| {}).await.unwrap();

        assert_eq!(tokio::fs::read(&destination).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_download_404() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/download"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let client = client_for(&server).await;
        let error = client
            .download_file("missing.bin", &temp_dir.path().join("missing.bin"), |_| {})
            .await
            .unwrap_err();

        assert!(matches!(error, DownloadError::NotFound { .. }));
        assert_eq!(error.to_string(), "Page not found (404). Not Found");
    }

    #[tokio::test]
    async fn test_download_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let client = client_for(&server).await;
        let error = client
            .download_file("a.bin", &temp_dir.path().join("a.bin"), |_| {})
            .await
            .unwrap_err();

        assert!(matches!(error, DownloadError::ServerError { status: 500 }));
    }

    #[tokio::test]
    async fn test_unwritable_destination_sends_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
            .expect(0)
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        // Parent directory does not exist
        let destination = temp_dir.path().join("no-such-dir").join("a.bin");
        let client = client_for(&server).await;
        let error = client
            .download_file("a.bin", &destination, |_| {})
            .await
            .unwrap_err();

        assert!(matches!(error, DownloadError::FilePermission { .. }));
    }

    #[tokio::test]
    async fn test_stalled_download_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"late".to_vec())
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let endpoint = ServiceEndpoint::new(&server.uri(), "k", "lin").unwrap();
        let config = ClientConfig {
            chunk_timeout: Duration::from_millis(100),
            ..Default::default()
        };
        let client = UpdateClient::new(endpoint, config).unwrap();

        let temp_dir = TempDir::new().unwrap();
        let result = tokio::time::timeout(
            Duration::from_secs(10),
            client.download_file("a.bin", &temp_dir.path().join("a.bin"), |_| {}),
        )
        .await
        .unwrap();

        assert!(matches!(result, Err(DownloadError::Timeout { .. })));
    }
}
