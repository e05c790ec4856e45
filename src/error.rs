//! Error types
//!
//! Crate-wide error type. Registry specific failures live in
//! [`crate::registry::RegistryError`] and convert into [`Error`].

use thiserror::Error;

use crate::registry::RegistryError;

/// Error type for connection and streaming operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error while starting or reading a source
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection registry error
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// No catalog entry matches the requested profile
    #[error("Unsupported profile: {0}")]
    UnsupportedProfile(String),

    /// The message loop is no longer running
    #[error("Scheduler stopped")]
    SchedulerStopped,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
