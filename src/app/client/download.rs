//! Single-item downloads streamed straight to disk
//!
//! The destination is opened (and truncated) before the request is sent and
//! every received chunk is written immediately. Nothing is rolled back on
//! failure: a partially written file will simply not match its expected hash
//! on the next run.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, trace, warn};
use url::Url;

use crate::app::client::http::{redact, HttpHandler};
use crate::app::client::sink::{pump_into, FileSink, HashSink, PumpError};
use crate::app::hash::Sha1Hash;
use crate::constants::http;
use crate::errors::{DownloadError, DownloadResult};

/// Outcome of a completed download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferResult {
    /// Bytes written to the destination
    pub bytes: u64,
    /// SHA-1 of the bytes written
    pub hash: Sha1Hash,
}

/// File download operations handler
pub struct DownloadHandler<'a> {
    http_handler: &'a HttpHandler,
    chunk_timeout: Duration,
}

impl<'a> DownloadHandler<'a> {
    /// Creates a new DownloadHandler with the given HTTP handler
    pub fn new(http_handler: &'a HttpHandler, chunk_timeout: Duration) -> Self {
        Self {
            http_handler,
            chunk_timeout,
        }
    }

    /// Download `url` into `destination`, reporting progress per chunk
    ///
    /// `on_progress` receives the cumulative byte count once for every chunk
    /// written, with no coalescing. The body is hashed as it is written.
    ///
    /// # Errors
    ///
    /// - `FilePermission` if the destination cannot be opened or written; no
    ///   request is sent when opening fails
    /// - `NotFound` on HTTP 404, `ServerError` on any other non-success status
    /// - `Http` on transport failures
    /// - `Timeout` when the headers or any body chunk take longer than the
    ///   chunk timeout to arrive
    pub async fn download_file<F>(
        &self,
        url: &Url,
        destination: &Path,
        mut on_progress: F,
    ) -> DownloadResult<TransferResult>
    where
        F: FnMut(u64),
    {
        let permission_error = |source: std::io::Error| DownloadError::FilePermission {
            path: destination.to_path_buf(),
            source,
        };

        let file = FileSink::create(destination).await.map_err(|e| {
            warn!("Cannot open {} for writing: {}", destination.display(), e);
            permission_error(e)
        })?;
        let mut sink = (file, HashSink::new());

        let timeout_error = || DownloadError::Timeout {
            seconds: self.chunk_timeout.as_secs(),
        };

        let response = tokio::time::timeout(self.chunk_timeout, self.http_handler.get(url, None))
            .await
            .map_err(|_| timeout_error())??;
        let status = response.status();

        if status.as_u16() == http::NOT_FOUND {
            return Err(DownloadError::NotFound {
                status_text: status.canonical_reason().unwrap_or("Not Found").to_string(),
            });
        }
        if !status.is_success() {
            return Err(DownloadError::ServerError {
                status: status.as_u16(),
            });
        }

        let total = pump_into(
            response.bytes_stream(),
            &mut sink,
            self.chunk_timeout,
            |received| {
                trace!("{}: {} bytes", destination.display(), received);
                on_progress(received);
            },
        )
        .await;

        let total = total.map_err(|e| match e {
            PumpError::Source(e) => DownloadError::Http(e),
            PumpError::Sink(e) => permission_error(e),
            PumpError::Timeout => timeout_error(),
        })?;

        let (file, hasher) = sink;
        file.close().await.map_err(permission_error)?;
        let hash = hasher.finalize();
        debug!(
            "Downloaded {} bytes from {} to {}",
            total,
            redact(url),
            destination.display()
        );

        Ok(TransferResult { bytes: total, hash })
    }
}
