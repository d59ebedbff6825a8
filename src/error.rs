//! Shared error type for every stage, queue, scheduler and framing operation.
//!
//! Mirrors the plain enum + manual `Display`/`Error` impl style used by the
//! block-level codec types (`Lz4Error`, `Lz4FError`) rather than pulling in
//! an error-derive crate: this crate has no CLI boundary, so there is no
//! layer that would benefit from `anyhow`-style context chaining.

use std::fmt;
use std::io;

/// Failure classes shared by every stage, queue and framing primitive.
#[derive(Debug)]
pub enum StageError {
    /// Could not acquire an OS-level resource (file, socket, thread, mutex).
    Resource(String),
    /// Read/write/close failure at an OS boundary.
    Io(io::Error),
    /// A stage or protocol state machine was used out of order (writing to
    /// a reader-only stage, a frame value too long, an out-of-order sender
    /// transition).
    Protocol(String),
    /// The compression/decompression library rejected input or produced a
    /// malformed stream.
    Codec(String),
    /// A lock or a scheduler that is already held/running was asked to
    /// start again.
    Busy,
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageError::Resource(msg) => write!(f, "resource unavailable: {msg}"),
            StageError::Io(e) => write!(f, "io error: {e}"),
            StageError::Protocol(msg) => write!(f, "protocol error: {msg}"),
            StageError::Codec(msg) => write!(f, "codec error: {msg}"),
            StageError::Busy => write!(f, "already locked or running"),
        }
    }
}

impl std::error::Error for StageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StageError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StageError {
    fn from(e: io::Error) -> Self {
        StageError::Io(e)
    }
}

/// Informational return from [`crate::queue::BoundedQueue::pop`], not a
/// failure: the queue was closed and fully drained. Modeled as a distinct
/// value rather than an `StageError` variant because the original `Queue`
/// returns it as a non-negative status, not through the error path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueSignal {
    /// An item was received.
    Item,
    /// The queue is closed and empty; no further items will arrive.
    Flushed,
}

pub type StageResult<T> = Result<T, StageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_human_readable() {
        assert_eq!(
            StageError::Resource("fd limit".into()).to_string(),
            "resource unavailable: fd limit"
        );
        assert_eq!(StageError::Busy.to_string(), "already locked or running");
    }

    #[test]
    fn io_error_round_trips_as_source() {
        use std::error::Error;
        let io_err = io::Error::new(io::ErrorKind::Other, "boom");
        let wrapped = StageError::from(io_err);
        assert!(wrapped.source().is_some());
    }
}
