//! Output sinks for streamed bodies
//!
//! Every transfer in the launcher is the same loop: pull the next chunk from a
//! byte stream, hand it to a sink, report the cumulative count. The sinks
//! differ only in where the bytes go ([`BufferSink`] for the manifest body,
//! [`FileSink`] for downloads, [`HashSink`] for local hashing), so a single
//! [`pump_into`] drives all of them. A pair of sinks is itself a sink, which is
//! how downloads are hashed while they are written.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use sha1::{Digest, Sha1};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::app::hash::Sha1Hash;

/// Destination for the chunks of a streamed body
pub trait BodySink {
    /// Consume one chunk
    fn accept(&mut self, chunk: &[u8]) -> impl Future<Output = io::Result<()>> + Send;
}

/// Failure while pumping a stream into a sink
#[derive(Debug)]
pub enum PumpError<E> {
    /// The source stream yielded an error
    Source(E),
    /// The sink rejected a chunk
    Sink(io::Error),
    /// No chunk arrived within the idle timeout
    Timeout,
}

/// Drive `stream` to completion into `sink`
///
/// `on_chunk` is invoked once per received chunk, after the chunk has been
/// accepted, with the cumulative byte count. Returns the total byte count.
pub async fn pump_into<S, St, E, F>(
    stream: St,
    sink: &mut S,
    chunk_timeout: Duration,
    mut on_chunk: F,
) -> Result<u64, PumpError<E>>
where
    S: BodySink,
    St: Stream<Item = Result<Bytes, E>>,
    F: FnMut(u64),
{
    futures::pin_mut!(stream);
    let mut total: u64 = 0;

    loop {
        let next = tokio::time::timeout(chunk_timeout, stream.next())
            .await
            .map_err(|_| PumpError::Timeout)?;

        match next {
            Some(Ok(chunk)) => {
                sink.accept(&chunk).await.map_err(PumpError::Sink)?;
                total += chunk.len() as u64;
                on_chunk(total);
            }
            Some(Err(e)) => return Err(PumpError::Source(e)),
            None => return Ok(total),
        }
    }
}

/// Accumulates the body in memory
#[derive(Debug, Default)]
pub struct BufferSink {
    data: Vec<u8>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the accumulated bytes
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl BodySink for BufferSink {
    async fn accept(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.data.extend_from_slice(chunk);
        Ok(())
    }
}

/// Writes the body verbatim to a file, truncating any previous content
#[derive(Debug)]
pub struct FileSink {
    file: File,
    path: PathBuf,
}

impl FileSink {
    /// Open (create or truncate) `path` for binary writing
    pub async fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path).await?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Destination path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush buffered data and close the file
    pub async fn close(mut self) -> io::Result<()> {
        self.file.flush().await?;
        self.file.sync_all().await
    }
}

impl BodySink for FileSink {
    async fn accept(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.file.write_all(chunk).await
    }
}

/// Feeds the body through SHA-1
#[derive(Debug, Default, Clone)]
pub struct HashSink {
    hasher: Sha1,
}

impl HashSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finish hashing and return the digest
    pub fn finalize(self) -> Sha1Hash {
        Sha1Hash::from_bytes(self.hasher.finalize().into())
    }
}

impl BodySink for HashSink {
    async fn accept(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.hasher.update(chunk);
        Ok(())
    }
}

/// Feeds every chunk to both sinks, first `A` then `B`
impl<A, B> BodySink for (A, B)
where
    A: BodySink + Send,
    B: BodySink + Send,
{
    async fn accept(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.0.accept(chunk).await?;
        self.1.accept(chunk).await
    }
}
