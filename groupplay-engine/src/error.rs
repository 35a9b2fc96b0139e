//! Error types for groupplay-engine
//!
//! Every variant is recoverable at the controller boundary, where it is
//! turned into a user-visible notification.

use thiserror::Error;

/// Main error type for the playback engine
#[derive(Error, Debug)]
pub enum Error {
    /// Reference could not be turned into a playable stream
    #[error("Failed to resolve reference: {0}")]
    Resolution(String),

    /// Search provider failed or returned nothing
    #[error("Query failed. Error: {0}")]
    Search(String),

    /// The group has no active audio connection
    #[error("Not connected")]
    NotConnected,

    /// Delete/remove on an index outside the pending queue
    #[error("Index out of range: {index} (queue has {len} entries)")]
    IndexOutOfRange { index: usize, len: usize },

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Audio output device errors reported by the sink
    #[error("Audio sink error: {0}")]
    Sink(String),

    /// Command text could not be parsed
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File or process I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<groupplay_common::Error> for Error {
    fn from(err: groupplay_common::Error) -> Self {
        match err {
            groupplay_common::Error::Io(e) => Error::Io(e),
            other => Error::Config(other.to_string()),
        }
    }
}

/// Convenience Result type using the engine Error
pub type Result<T> = std::result::Result<T, Error>;
