//! Injected logging sink.
//!
//! The LZ4 port this crate grew out of gates `eprintln!` calls behind a
//! single process-wide `AtomicI32` (`DISPLAY_LEVEL`) read by a free
//! function. That is exactly the concealed global coupling this crate's
//! design notes call out: two independent pipelines in one process should
//! be able to log at different levels, or not at all, without stepping on
//! each other. So instead of a global, every [`crate::scheduler::Scheduler`]
//! and [`crate::stage::socket::SocketStage`] server holds an `Arc<dyn Sink>`
//! handed to it at construction.

use std::sync::Arc;

/// Severity of a logged message, ordered least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// A destination for log messages. Must be safe to share across the
/// threads a scheduler or socket server spawns.
pub trait Sink: Send + Sync {
    fn log(&self, level: Level, message: &str);
}

/// Default sink: writes to stderr, gated by a minimum level, the same
/// filtering `display_level()` performed against the old global.
pub struct StderrSink {
    min_level: Level,
}

impl StderrSink {
    pub fn new(min_level: Level) -> Self {
        StderrSink { min_level }
    }
}

impl Default for StderrSink {
    fn default() -> Self {
        StderrSink::new(Level::Info)
    }
}

impl Sink for StderrSink {
    fn log(&self, level: Level, message: &str) {
        if level >= self.min_level {
            eprintln!("[{level:?}] {message}");
        }
    }
}

/// A sink that discards everything; useful for tests that want two
/// independent stacks in one process without stderr interleaving.
pub struct NullSink;

impl Sink for NullSink {
    fn log(&self, _level: Level, _message: &str) {}
}

pub fn null_sink() -> Arc<dyn Sink> {
    Arc::new(NullSink)
}
