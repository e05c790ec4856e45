//! Protocol negotiation
//!
//! This module provides:
//! - The [`Protocol`] descriptor and its `protocolInfo` rendering
//! - The [`ProtocolCatalog`] of declared source/sink protocols
//! - Best-match selection over the catalog for a requested content shape

pub mod catalog;
pub mod constants;
pub mod descriptor;

pub use catalog::ProtocolCatalog;
pub use descriptor::{AudioFormat, EncoderHints, Protocol, VideoFormat};
