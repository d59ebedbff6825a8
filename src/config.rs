//! Runtime configuration value types.
//!
//! No file grammar ships with this crate (config-file parsing is an
//! external collaborator's job); these are plain structs with sensible
//! defaults and setters, the same shape as the teacher's previous
//! `io::prefs::Prefs` — just without anything reading them off disk or
//! off argv.

use std::time::Duration;

/// Tunables for a [`crate::scheduler::Scheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Workers kept warm even while idle. 0 means the pool starts empty.
    pub min_threads: usize,
    /// Hard ceiling on concurrently busy workers. 0 means unbounded (a new
    /// worker is always created rather than round-robin-reused).
    pub max_threads: usize,
    /// How long an idle worker survives before the monitor reaps it.
    pub idle_timeout: Duration,
    /// Capacity of the scheduler's own input queue.
    pub queue_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            min_threads: 0,
            max_threads: 4,
            idle_timeout: Duration::from_secs(30),
            queue_capacity: 64,
        }
    }
}

impl SchedulerConfig {
    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    pub fn with_min_threads(mut self, min_threads: usize) -> Self {
        self.min_threads = min_threads;
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }
}

/// Gzip level, kept as a distinct type so call sites read as intent rather
/// than a bare `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GzipLevel(u32);

impl GzipLevel {
    pub fn new(level: u32) -> Self {
        GzipLevel(level.clamp(1, 9))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for GzipLevel {
    fn default() -> Self {
        GzipLevel::new(6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_config_default_is_sane() {
        let cfg = SchedulerConfig::default();
        assert!(cfg.max_threads > 0);
        assert!(cfg.queue_capacity > 0);
    }

    #[test]
    fn gzip_level_clamps_to_valid_range() {
        assert_eq!(GzipLevel::new(0).get(), 1);
        assert_eq!(GzipLevel::new(20).get(), 9);
        assert_eq!(GzipLevel::new(5).get(), 5);
    }
}
