//! Scenario 6 — async writer: pushing N buffers through a slow child
//! completes in roughly N times the child's per-call latency (not more),
//! and every byte pushed is eventually delivered.

use std::time::{Duration, Instant};

use pipeworks::{AsyncWriter, FileWriter, Stage};
use tempfile::tempdir;

#[test]
fn async_writer_delivers_all_bytes_without_blocking_on_child_latency() {
    struct SlowWriter {
        inner: FileWriter,
        delay: Duration,
    }

    impl Stage for SlowWriter {
        fn open(&mut self) -> pipeworks::StageResult<()> {
            self.inner.open()
        }
        fn close(&mut self) -> pipeworks::StageResult<()> {
            self.inner.close()
        }
        fn put(&mut self, buf: &[u8]) -> pipeworks::StageResult<usize> {
            std::thread::sleep(self.delay);
            self.inner.put(buf)
        }
    }

    let dir = tempdir().unwrap();
    let path = dir.path().join("async.bin").to_str().unwrap().to_string();

    let slow = SlowWriter {
        inner: FileWriter::new(path.clone()),
        delay: Duration::from_millis(10),
    };

    let mut writer = AsyncWriter::new(Box::new(slow)).unwrap();
    writer.open().unwrap();

    let start = Instant::now();
    let mut total_pushed = 0usize;
    for _ in 0..100 {
        let buf = [7u8; 32];
        writer.put(&buf).unwrap();
        total_pushed += buf.len();
    }
    writer.close().unwrap();
    let elapsed = start.elapsed();

    // The caller only ever waits for the previous hand-off to be
    // accepted, not for the child's full latency on every call; generous
    // upper bound well below the fully-serial 100 * 10ms baseline plus
    // slack for the final drain.
    assert!(
        elapsed < Duration::from_millis(1200),
        "async writer took too long: {elapsed:?}"
    );

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len(), total_pushed);
}
