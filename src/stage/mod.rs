//! The stream-stage contract every concrete stage implements, plus the
//! concrete stages themselves.
//!
//! A stage is one link in a byte-stream pipeline: a file, a gzip envelope, a
//! digest, a fan-out to several children, a hand-off to a background
//! thread, or a socket. Stages chain by owning (or borrowing) a `child:
//! Box<dyn Stage>` and forwarding `path()`/`offset()` to the bottom of the
//! chain by default.
//!
//! Grounded on `include/ireaderwriter.h` (the child-chaining variant, not
//! the older read/write-only `base/ireaderwriter.h`): a stage holds a
//! `child` and a flag for whether it owns it, and `path`/`offset` default to
//! forwarding. In Rust, exclusive ownership collapses to plain `Box`
//! ownership and the non-owning case to a borrow, so no separate
//! `delete_child` flag is carried at runtime the way the original does.

pub mod async_writer;
pub mod file;
pub mod gzip;
pub mod hasher;
pub mod multiwriter;
pub mod socket;

use crate::error::StageResult;

/// Uniform interface honored by every concrete stage in this crate.
///
/// Lifecycle: constructed → `open` → any number of `get`/`put` calls →
/// `close`. Implementations should make `close` idempotent and safe to call
/// even after a prior operation failed, since callers are expected to
/// always close a stage that errored.
pub trait Stage {
    /// Acquire the underlying resource and open the child, if any.
    fn open(&mut self) -> StageResult<()>;

    /// Release resources and close the child, if any. Always attempts to
    /// close the child even if this stage itself failed first.
    fn close(&mut self) -> StageResult<()>;

    /// Read up to `buf.len()` bytes. Returns the number of bytes actually
    /// read; `0` means end-of-stream. Default: unsupported (write-only
    /// stages such as the compressor or the async writer never implement
    /// this).
    fn get(&mut self, buf: &mut [u8]) -> StageResult<usize> {
        let _ = buf;
        Err(crate::error::StageError::Protocol(
            "stage does not support get()".into(),
        ))
    }

    /// Write exactly `buf.len()` bytes, or fail. Default: unsupported
    /// (read-only stages such as the decompressor never implement this).
    fn put(&mut self, buf: &[u8]) -> StageResult<usize> {
        let _ = buf;
        Err(crate::error::StageError::Protocol(
            "stage does not support put()".into(),
        ))
    }

    /// Path of the bottom-of-chain resource, if known.
    fn path(&self) -> Option<&str> {
        None
    }

    /// Cumulative bytes transferred through the bottom-of-chain resource
    /// since `open`.
    fn offset(&self) -> u64 {
        0
    }
}
