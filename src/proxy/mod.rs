//! Shared streaming proxy
//!
//! Lets one expensive sequential producer (a transcoder) be read by several
//! HTTP consumers without restarting it.
//!
//! ```text
//!   transcoder ──read──► [producer thread] ──► ring buffer (block_size × block_count)
//!                                                   │
//!                              ┌────────────────────┼────────────────────┐
//!                              ▼                    ▼                    ▼
//!                        StreamProxy          StreamProxy          StreamProxy
//!                        (cursor 1)           (cursor 2)           (cursor 3)
//! ```
//!
//! Every cursor sees the complete byte sequence from offset 0 in order.
//! Cursors can only join while nothing has been evicted yet; after that a
//! new request has to start its own source.

pub mod config;
pub mod cursor;
pub mod source;

pub use config::ProxyConfig;
pub use cursor::StreamProxy;
pub use source::{CursorId, SourceStats, StreamSource};
