//! Manifest retrieval
//!
//! The manifest is the ordered list of files the update service declares for
//! a given API key and platform. It is fetched once per sync run and never
//! modified afterwards.
//!
//! - [`types`] - [`ManifestEntry`] and body parsing

use std::time::Duration;

use tracing::{debug, info};
use url::Url;

use crate::app::client::http::{redact, HttpHandler};
use crate::app::client::sink::{pump_into, BufferSink, PumpError};
use crate::constants::http;
use crate::errors::{ManifestError, ManifestResult};

pub mod types;

pub use types::{parse_manifest, ManifestEntry};

/// Manifest fetch handler
pub struct ManifestHandler<'a> {
    http_handler: &'a HttpHandler,
    request_timeout: Duration,
    chunk_timeout: Duration,
}

impl<'a> ManifestHandler<'a> {
    pub fn new(
        http_handler: &'a HttpHandler,
        request_timeout: Duration,
        chunk_timeout: Duration,
    ) -> Self {
        Self {
            http_handler,
            request_timeout,
            chunk_timeout,
        }
    }

    /// Fetch and parse the manifest at `url`
    ///
    /// # Errors
    ///
    /// - `NotFound` carrying the response body on HTTP 404
    /// - `ServerError` on any other non-success status
    /// - `Http`/`Timeout` on transport failures
    /// - `InvalidFormat` if the body is not a JSON array
    pub async fn fetch(&self, url: &Url) -> ManifestResult<Vec<ManifestEntry>> {
        debug!("Fetching manifest from {}", redact(url));
        let response = self.http_handler.get(url, Some(self.request_timeout)).await?;
        let status = response.status();

        let mut sink = BufferSink::new();
        let received =
            pump_into(response.bytes_stream(), &mut sink, self.chunk_timeout, |_| {}).await;
        let body = match received {
            Ok(_) => sink.into_inner(),
            Err(PumpError::Source(e)) => return Err(ManifestError::Http(e)),
            Err(PumpError::Sink(e)) => {
                return Err(ManifestError::InvalidFormat {
                    reason: e.to_string(),
                })
            }
            Err(PumpError::Timeout) => {
                return Err(ManifestError::Timeout {
                    seconds: self.chunk_timeout.as_secs(),
                })
            }
        };

        if status.as_u16() == http::NOT_FOUND {
            return Err(ManifestError::NotFound {
                body: String::from_utf8_lossy(&body).trim().to_string(),
            });
        }
        if !status.is_success() {
            return Err(ManifestError::ServerError {
                status: status.as_u16(),
            });
        }

        let entries = parse_manifest(&body)?;
        info!("Manifest lists {} files", entries.len());
        Ok(entries)
    }
}
