// SPDX-License-Identifier: Apache-2.0 OR MIT
// Crate-wide error type and taxonomy

use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error taxonomy, used by error handlers to classify failures
/// without matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid configuration, rejected at construction
    Config,
    /// OS-level file or stream failure
    Io,
    /// Circular buffer overflow, underflow, or full-after-compaction
    Buffer,
    /// Lifecycle violations (already started, queue closed, ...)
    State,
    /// Catch-all
    Unexpected,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid placeholder: {0}")]
    InvalidPlaceholder(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A single write larger than the buffer capacity can never succeed.
    #[error("write of {requested} bytes exceeds buffer capacity {capacity}")]
    BufferOverflow { requested: usize, capacity: usize },

    /// The buffer cannot take the write even after compaction.
    #[error("buffer full: {requested} bytes requested, {available} available")]
    BufferFull { requested: usize, available: usize },

    #[error("buffer empty")]
    BufferUnderflow,

    #[error("async pipeline already started")]
    AlreadyStarted,

    #[error("async pipeline not started")]
    NotStarted,

    #[error("queue closed")]
    QueueClosed,

    #[error("drain timed out with {remaining} entries queued")]
    DrainTimeout { remaining: usize },

    #[error("default logger already initialized")]
    AlreadyInitialized,

    #[error("{0}")]
    Unexpected(String),
}

impl Error {
    /// Map a variant onto the coarse taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) | Error::InvalidPlaceholder(_) => ErrorKind::Config,
            Error::Io(_) => ErrorKind::Io,
            Error::BufferOverflow { .. } | Error::BufferFull { .. } | Error::BufferUnderflow => {
                ErrorKind::Buffer
            }
            Error::AlreadyStarted
            | Error::NotStarted
            | Error::QueueClosed
            | Error::DrainTimeout { .. }
            | Error::AlreadyInitialized => ErrorKind::State,
            Error::Unexpected(_) => ErrorKind::Unexpected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(Error::Config("x".into()).kind(), ErrorKind::Config);
        assert_eq!(Error::InvalidPlaceholder("x".into()).kind(), ErrorKind::Config);
        assert_eq!(
            Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "x")).kind(),
            ErrorKind::Io
        );
        assert_eq!(
            Error::BufferFull {
                requested: 8,
                available: 4
            }
            .kind(),
            ErrorKind::Buffer
        );
        assert_eq!(Error::QueueClosed.kind(), ErrorKind::State);
        assert_eq!(Error::Unexpected("x".into()).kind(), ErrorKind::Unexpected);
    }

    #[test]
    fn test_display() {
        let err = Error::BufferOverflow {
            requested: 100,
            capacity: 64,
        };
        assert_eq!(
            err.to_string(),
            "write of 100 bytes exceeds buffer capacity 64"
        );
    }
}
