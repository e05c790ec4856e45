//! Shared stream source
//!
//! A [`StreamSource`] owns one sequential input (typically a transcoder's
//! output) and a fixed-capacity ring buffer filled by a dedicated producer
//! thread. Any number of cursors read the buffer independently; bytes are
//! only evicted once every attached cursor has moved past them.
//!
//! ```text
//!        buffer_offset                 buffer_offset + buffer_used
//!              │                                   │
//!   ───────────┼───────────────────────────────────┼──────────► absolute offset
//!              │  resident bytes                   │  producer writes here
//!              │      ▲                ▲           │
//!              │   cursor 2         cursor 1       │
//! ```
//!
//! All offsets are absolute byte positions in the stream; the physical ring
//! position is `offset % capacity`. A cursor can only attach while
//! `buffer_offset == 0`, i.e. before the first byte has been evicted.

use std::collections::BTreeMap;
use std::io::{self, Read};
use std::sync::Arc;
use std::thread::JoinHandle;

use bytes::Bytes;
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::Result;
use crate::scheduler::{Scheduler, Task};

use super::config::ProxyConfig;
use super::cursor::StreamProxy;

/// Identifier of a cursor attached to a source
pub type CursorId = u64;

/// Per-cursor read position
#[derive(Debug, Clone, Copy, Default)]
struct CursorState {
    /// Absolute offset of the next byte to deliver
    offset: usize,
    /// Bytes handed out but not yet committed
    available: usize,
}

struct SourceState {
    stream_end: bool,
    buffer: Box<[u8]>,
    buffer_offset: usize,
    buffer_used: usize,
    cursors: BTreeMap<CursorId, CursorState>,
    next_cursor_id: CursorId,
}

impl SourceState {
    /// Advance the eviction floor to the slowest cursor, in whole blocks
    ///
    /// Returns true when space was freed.
    fn recompute_buffer_offset(&mut self, config: &ProxyConfig) -> bool {
        let Some(frontier) = self.cursors.values().map(|c| c.offset).min() else {
            return false;
        };

        let block_size = config.block_size;
        let three_quarters = config.capacity() * 3 / 4;

        if frontier < self.buffer_offset + block_size {
            return false;
        }

        // Keep the attach window open until the buffer is mostly full
        if self.buffer_offset == 0 && self.buffer_used < three_quarters {
            return false;
        }

        let proceed = ((frontier - self.buffer_offset) / block_size) * block_size;
        self.buffer_offset += proceed;
        self.buffer_used -= proceed;

        tracing::trace!(
            buffer_offset = self.buffer_offset,
            buffer_used = self.buffer_used,
            "Eviction frontier advanced"
        );

        true
    }

    fn commit(&mut self, id: CursorId) {
        if let Some(cursor) = self.cursors.get_mut(&id) {
            cursor.offset += cursor.available;
            cursor.available = 0;
        }
    }
}

struct Shared {
    config: ProxyConfig,
    state: Mutex<SourceState>,
    condition: Condvar,
}

/// Snapshot of a source's buffer bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceStats {
    /// Ring buffer capacity in bytes
    pub capacity: usize,
    /// Lowest absolute offset still resident
    pub buffer_offset: usize,
    /// Number of resident bytes
    pub buffer_used: usize,
    /// Number of attached cursors
    pub cursor_count: usize,
    /// Whether the producer has finished
    pub stream_end: bool,
}

type DetachHandler = Arc<dyn Fn() + Send + Sync>;

/// Single-producer, multi-consumer ring buffer over a sequential input
pub struct StreamSource {
    shared: Arc<Shared>,
    producer: Option<JoinHandle<()>>,
    close_handlers: Mutex<Vec<(Arc<dyn Scheduler>, Task)>>,
    detach_handlers: Mutex<Vec<(Arc<dyn Scheduler>, DetachHandler)>>,
}

impl StreamSource {
    /// Start a source reading `input` on a new producer thread
    ///
    /// Out-of-range sizes in `config` are clamped to the builder limits.
    pub fn spawn<R>(input: R, config: ProxyConfig) -> Result<Arc<Self>>
    where
        R: Read + Send + 'static,
    {
        let config = config.clamped();
        let shared = Arc::new(Shared {
            config,
            state: Mutex::new(SourceState {
                stream_end: false,
                buffer: vec![0u8; config.capacity()].into_boxed_slice(),
                buffer_offset: 0,
                buffer_used: 0,
                cursors: BTreeMap::new(),
                next_cursor_id: 1,
            }),
            condition: Condvar::new(),
        });

        let producer_shared = Arc::clone(&shared);
        let producer = std::thread::Builder::new()
            .name("stream-source".into())
            .spawn(move || produce(producer_shared, input))?;

        tracing::debug!(
            block_size = config.block_size,
            block_count = config.block_count,
            "Stream source started"
        );

        Ok(Arc::new(Self {
            shared,
            producer: Some(producer),
            close_handlers: Mutex::new(Vec::new()),
            detach_handlers: Mutex::new(Vec::new()),
        }))
    }

    /// Attach a new cursor starting at offset 0
    ///
    /// Fails (returns `None`) once any byte has been evicted.
    pub fn attach(self: &Arc<Self>) -> Option<StreamProxy> {
        let mut state = self.shared.state.lock();

        if state.buffer_offset != 0 {
            return None;
        }

        let id = state.next_cursor_id;
        state.next_cursor_id += 1;
        state.cursors.insert(id, CursorState::default());

        tracing::trace!(cursor = id, "Cursor attached");

        Some(StreamProxy::new(Arc::clone(self), id))
    }

    /// Remove a cursor from the eviction computation
    pub(crate) fn detach(&self, id: CursorId) {
        {
            let mut state = self.shared.state.lock();
            if state.cursors.remove(&id).is_none() {
                return;
            }

            if state.recompute_buffer_offset(&self.shared.config) {
                self.shared.condition.notify_all();
            }
        }

        tracing::trace!(cursor = id, "Cursor detached");

        for (scheduler, handler) in self.detach_handlers.lock().iter() {
            let handler = Arc::clone(handler);
            scheduler.post(Box::new(move || handler()));
        }
    }

    /// Commit the previous span, then block until bytes are available past
    /// the cursor or the stream has ended
    ///
    /// Returns the next contiguous span (at most one block, never crossing
    /// the ring wrap point), or `None` at end of stream.
    pub(crate) fn read_chunk(&self, id: CursorId) -> Option<Bytes> {
        let config = &self.shared.config;
        let mut state = self.shared.state.lock();

        state.commit(id);
        let offset = state.cursors.get(&id)?.offset;

        if state.recompute_buffer_offset(config) {
            self.shared.condition.notify_all();
        }

        while !state.stream_end && state.buffer_offset + state.buffer_used <= offset {
            self.shared.condition.wait(&mut state);
        }

        let end = state.buffer_offset + state.buffer_used;
        if end <= offset {
            return None;
        }

        let capacity = config.capacity();
        let pos = offset % capacity;
        let size = (capacity - pos).min(end - offset).min(config.block_size);
        let chunk = Bytes::copy_from_slice(&state.buffer[pos..pos + size]);

        if let Some(cursor) = state.cursors.get_mut(&id) {
            cursor.available = size;
        }

        Some(chunk)
    }

    /// Commit the span handed out by the last [`read_chunk`](Self::read_chunk)
    pub(crate) fn release(&self, id: CursorId) {
        let mut state = self.shared.state.lock();
        state.commit(id);

        if state.recompute_buffer_offset(&self.shared.config) {
            self.shared.condition.notify_all();
        }
    }

    /// Committed absolute offset of a cursor
    pub(crate) fn cursor_offset(&self, id: CursorId) -> Option<usize> {
        self.shared.state.lock().cursors.get(&id).map(|c| c.offset)
    }

    /// Run `handler` on `scheduler` once this source has been torn down
    pub fn subscribe_close<F>(&self, scheduler: &Arc<dyn Scheduler>, handler: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.close_handlers
            .lock()
            .push((Arc::clone(scheduler), Box::new(handler)));
    }

    /// Run `handler` on `scheduler` every time a cursor detaches
    pub fn subscribe_detach<F>(&self, scheduler: &Arc<dyn Scheduler>, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.detach_handlers
            .lock()
            .push((Arc::clone(scheduler), Arc::new(handler)));
    }

    /// Whether a new cursor could still attach
    pub fn is_attachable(&self) -> bool {
        self.shared.state.lock().buffer_offset == 0
    }

    /// Buffer bookkeeping snapshot
    pub fn stats(&self) -> SourceStats {
        let state = self.shared.state.lock();

        SourceStats {
            capacity: self.shared.config.capacity(),
            buffer_offset: state.buffer_offset,
            buffer_used: state.buffer_used,
            cursor_count: state.cursors.len(),
            stream_end: state.stream_end,
        }
    }

    /// Ring buffer configuration
    pub fn config(&self) -> &ProxyConfig {
        &self.shared.config
    }
}

impl Drop for StreamSource {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.stream_end = true;
            self.shared.condition.notify_all();
        }

        if let Some(producer) = self.producer.take() {
            if producer.join().is_err() {
                tracing::warn!("Stream source producer panicked");
            }
        }

        tracing::debug!("Stream source closed");

        for (scheduler, handler) in self.close_handlers.get_mut().drain(..) {
            scheduler.post(handler);
        }
    }
}

/// Marks the stream ended and wakes every waiter when the producer exits,
/// including by unwinding out of a panicking input
struct EndOfStream<'a>(&'a Shared);

impl Drop for EndOfStream<'_> {
    fn drop(&mut self) {
        let mut state = self.0.state.lock();
        state.stream_end = true;
        self.0.condition.notify_all();
    }
}

/// Producer loop: fill the ring one block at a time until end of input
fn produce<R: Read>(shared: Arc<Shared>, mut input: R) {
    let _end = EndOfStream(&shared);
    let config = shared.config;
    let capacity = config.capacity();
    let mut scratch = vec![0u8; config.block_size];
    let mut total = 0usize;

    let mut state = shared.state.lock();

    loop {
        while !state.stream_end && state.buffer_used + config.block_size > capacity {
            shared.condition.wait(&mut state);
        }

        if state.stream_end {
            break;
        }

        // The write position is stable while unlocked: eviction moves
        // buffer_offset and buffer_used by the same amount.
        let pos = (state.buffer_offset + state.buffer_used) % capacity;
        let len = config.block_size.min(capacity - pos);

        let read = MutexGuard::unlocked(&mut state, || read_block(&mut input, &mut scratch[..len]));

        match read {
            Ok(0) => break,
            Ok(n) => {
                state.buffer[pos..pos + n].copy_from_slice(&scratch[..n]);
                state.buffer_used += n;
                total += n;
                shared.condition.notify_all();
            }
            Err(e) => {
                tracing::warn!(error = %e, bytes = total, "Stream source input failed");
                break;
            }
        }
    }

    drop(state);
    tracing::debug!(bytes = total, "Stream source input finished");
}

fn read_block<R: Read>(input: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match input.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}
