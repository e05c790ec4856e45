//! UPnP-AV ConnectionManager core
//!
//! Protocol negotiation and shared transcode streaming for a DLNA media
//! server. A client request names a content profile; the
//! [`ProtocolCatalog`] picks the protocol to serve; the [`ConnectionManager`]
//! either attaches the request to an identical stream that is already
//! running or starts a new [`StreamSource`] and hands back a readable
//! [`StreamProxy`].
//!
//! ```text
//!   request ──► ProtocolCatalog::get_video_protocol()
//!                        │
//!                        ▼
//!        ConnectionManager::open_output_connection()
//!             │ attach hit              │ attach miss
//!             ▼                         ▼
//!      existing StreamSource      start() ──► new StreamSource
//!             └──────────► StreamProxy ◄──────────┘
//!                               │
//!                               ▼
//!                          HTTP response
//! ```
//!
//! The SOAP transport, HTTP server and transcoder are external. They plug in
//! through [`upnp::RootDevice`], [`std::io::Read`] and the
//! [`scheduler::Scheduler`] trait.

pub mod error;
pub mod protocol;
pub mod proxy;
pub mod registry;
pub mod scheduler;
pub mod upnp;

pub use error::{Error, Result};
pub use protocol::{AudioFormat, EncoderHints, Protocol, ProtocolCatalog, VideoFormat};
pub use proxy::{ProxyConfig, StreamProxy, StreamSource};
pub use registry::{ConnectionInfo, ConnectionManager, RegistryConfig, RegistryError};
pub use scheduler::{MessageLoop, Scheduler};
