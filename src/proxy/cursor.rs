//! Per-consumer stream handle
//!
//! A [`StreamProxy`] is one consumer's cursor into a shared
//! [`StreamSource`]. It implements [`Read`] and [`BufRead`] so it can be
//! handed to an HTTP response writer like any other byte stream. Dropping
//! the proxy detaches the cursor.

use std::io::{self, BufRead, Read};
use std::sync::Arc;

use bytes::{Buf, Bytes};

use crate::error::Result;

use super::config::ProxyConfig;
use super::source::{CursorId, StreamSource};

/// Readable cursor over a shared source
pub struct StreamProxy {
    source: Arc<StreamSource>,
    id: CursorId,
    /// Unconsumed rest of the current span
    chunk: Bytes,
}

impl StreamProxy {
    pub(crate) fn new(source: Arc<StreamSource>, id: CursorId) -> Self {
        Self {
            source,
            id,
            chunk: Bytes::new(),
        }
    }

    /// Start a new source over `input` and attach the first cursor to it
    pub fn open<R>(input: R, config: ProxyConfig) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let source = StreamSource::spawn(input, config)?;

        // A fresh source has evicted nothing, so the first attach succeeds
        source
            .attach()
            .ok_or_else(|| io::Error::other("fresh source refused attach").into())
    }

    /// Attach another cursor to the same source
    ///
    /// Returns `None` once the source has started evicting bytes.
    pub fn attach(&self) -> Option<StreamProxy> {
        self.source.attach()
    }

    /// The shared source behind this cursor
    pub fn source(&self) -> &Arc<StreamSource> {
        &self.source
    }

    /// Committed absolute offset of this cursor
    pub fn position(&self) -> Option<usize> {
        self.source.cursor_offset(self.id)
    }

    /// Next span of the stream, or `None` at end of stream
    ///
    /// Blocks until data is available.
    pub fn next_chunk(&mut self) -> Option<Bytes> {
        if self.chunk.is_empty() {
            self.chunk = self.source.read_chunk(self.id)?;
        }

        let chunk = std::mem::take(&mut self.chunk);
        self.source.release(self.id);
        Some(chunk)
    }
}

impl BufRead for StreamProxy {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.chunk.is_empty() {
            if let Some(chunk) = self.source.read_chunk(self.id) {
                self.chunk = chunk;
            }
        }

        Ok(&self.chunk)
    }

    fn consume(&mut self, amt: usize) {
        self.chunk.advance(amt.min(self.chunk.len()));

        if self.chunk.is_empty() {
            self.source.release(self.id);
        }
    }
}

impl Read for StreamProxy {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl Drop for StreamProxy {
    fn drop(&mut self) {
        self.source.detach(self.id);
    }
}

impl std::fmt::Debug for StreamProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamProxy")
            .field("cursor", &self.id)
            .field("pending", &self.chunk.len())
            .finish()
    }
}
