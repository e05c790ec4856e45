//! Registry error types
//!
//! Error types for connection registry operations.

use thiserror::Error;

use super::key::OutputKey;

/// Error type for registry operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No retained connection serves this key
    #[error("No matching connection: {0}")]
    NoMatchingConnection(OutputKey),

    /// A matching connection exists but its source already evicted data
    #[error("De-duplication window closed for connection {connection_id}")]
    WindowClosed { connection_id: i32 },
}
