//! Scenario 2 — chaining three schedulers end to end.
//!
//! `s1 -> s2 -> s3`, each routine overwrites the first byte of the item
//! with 'b', 'c', 'd' respectively. After all three `stop()`s return, the
//! final output queue must contain every pushed item (order unspecified),
//! each now starting with 'd'.

use std::sync::Arc;
use std::time::Duration;

use pipeworks::{BoundedQueue, Routine, Scheduler, SchedulerConfig, StderrSink};

fn overwrite_first_byte(byte: u8, delay: Duration) -> Arc<Routine<String>> {
    Arc::new(move |mut s: String| {
        std::thread::sleep(delay);
        unsafe {
            s.as_bytes_mut()[0] = byte;
        }
        Some(s)
    })
}

#[test]
fn items_flow_through_three_chained_schedulers() {
    let sink: Arc<dyn pipeworks::LogSink> = Arc::new(StderrSink::new(pipeworks::LogLevel::Error));

    let q2 = Arc::new(BoundedQueue::new(256));
    let q3 = Arc::new(BoundedQueue::new(256));
    let q_final = Arc::new(BoundedQueue::new(4096));

    let mut s3 = Scheduler::with_input_queue(
        SchedulerConfig::default().with_max_threads(4),
        Arc::clone(&q3),
        Some(Arc::clone(&q_final)),
        overwrite_first_byte(b'd', Duration::from_millis(200)),
        Arc::clone(&sink),
    );
    let mut s2 = Scheduler::with_input_queue(
        SchedulerConfig::default().with_max_threads(4),
        Arc::clone(&q2),
        Some(Arc::clone(&q3)),
        overwrite_first_byte(b'c', Duration::from_millis(300)),
        Arc::clone(&sink),
    );
    let mut s1 = Scheduler::new(
        SchedulerConfig::default().with_max_threads(4),
        Some(Arc::clone(&q2)),
        overwrite_first_byte(b'b', Duration::from_millis(100)),
        Arc::clone(&sink),
    );

    let s1_input = s1.input();
    for i in 0..2100 {
        s1_input.push(format!("a{i:03}"));
    }

    s1.stop();
    s2.stop();
    s3.stop();
    q_final.close();

    let mut results = Vec::new();
    loop {
        match q_final.pop() {
            (Some(item), _) => results.push(item),
            (None, _) => break,
        }
    }

    assert_eq!(results.len(), 2100);
    assert!(results.iter().all(|s| s.starts_with('d')));
}
