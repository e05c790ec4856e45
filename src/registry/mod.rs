//! Connection registry
//!
//! The registry implements the ConnectionManager service: it issues
//! connection ids, tracks every active output connection and lets identical
//! requests share one running source while its de-duplication window is
//! open.
//!
//! # Architecture
//!
//! ```text
//!                        ConnectionManager
//!                  ┌───────────────────────────┐
//!                  │ connections: id → Info    │
//!                  │ sources:     id → Arc<Src>│ ◄── released after dedup_window
//!                  └─────────────┬─────────────┘     or on first detach
//!                                │
//!        try_attach(key) ────────┤
//!                                ▼
//!                          StreamSource ──close──► remove(id) ──► emit_event
//!                          ▲    ▲    ▲
//!                     cursor  cursor  cursor
//! ```
//!
//! Changes to the connection table, count notifications, events and
//! timeouts all run on the [`Scheduler`](crate::scheduler::Scheduler) loop
//! thread. Other threads reach it through `send`; queries read the
//! lock-protected table directly.

pub mod config;
pub mod entry;
pub mod error;
pub mod key;
pub mod store;
pub mod subscription;

pub use config::RegistryConfig;
pub use entry::{ConnectionInfo, ConnectionStatus, Direction, ProtocolInfo};
pub use error::RegistryError;
pub use key::OutputKey;
pub use store::{ConnectionManager, SERVICE_ID, SERVICE_TYPE};
pub use subscription::Subscription;
