// Composable stream stages, a bounded-queue worker-pool scheduler, and TLV
// framing — the reusable I/O core underneath a content-addressed backup
// pipeline.

pub mod config;
pub mod error;
pub mod log;
pub mod process_lock;
pub mod queue;
pub mod scheduler;
pub mod stage;
pub mod tlv;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level convenience re-exports for the most common entry points.
// ─────────────────────────────────────────────────────────────────────────────

pub use error::{StageError, StageResult};

/// The contract every stage in a pipeline honors.
pub use stage::Stage;

/// File, compression, digest, fan-out and async-hand-off stages.
pub use stage::async_writer::AsyncWriter;
pub use stage::file::{FileReader, FileWriter};
pub use stage::gzip::{GzipReader, GzipWriter};
pub use stage::hasher::{Algorithm as DigestAlgorithm, HasherStage};
pub use stage::multiwriter::MultiWriter;
pub use stage::socket::{Endpoint as SocketEndpoint, SocketStage};

/// The bounded producer/consumer queue used both standalone and as each
/// scheduler worker's private input.
pub use queue::BoundedQueue;

/// The worker-pool scheduler and its configuration.
pub use config::SchedulerConfig;
pub use scheduler::{ActivityCallback, Routine, Scheduler};

/// TLV framing over any [`Stage`], typically a `SocketStage` or a file.
pub use tlv::{Frame, Receiver, Sender};

/// Advisory per-name process lock.
pub use process_lock::ProcessLock;

/// Injected logging sink (replaces a global log level).
pub use log::{Level as LogLevel, Sink as LogSink, StderrSink};
