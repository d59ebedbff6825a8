//! Scenario 3 — worker-pool dynamics: growth under load, then idle decay.

use std::sync::Arc;
use std::time::Duration;

use pipeworks::{log::null_sink, Routine, Scheduler, SchedulerConfig};

#[test]
fn pool_grows_to_max_then_decays_to_zero_after_idle_timeout() {
    let routine: Arc<Routine<()>> = Arc::new(|_| {
        std::thread::sleep(Duration::from_millis(150));
        Some(())
    });

    let mut scheduler = Scheduler::new(
        SchedulerConfig::default()
            .with_max_threads(3)
            .with_idle_timeout(Duration::from_secs(2)),
        None,
        routine,
        null_sink(),
    );

    let input = scheduler.input();
    for _ in 0..6 {
        input.push(());
    }

    std::thread::sleep(Duration::from_millis(80));
    assert_eq!(scheduler.threads(), 3);

    // Let the burst finish and the idle timeout elapse, then force another
    // dispatch so the monitor has a chance to reap.
    std::thread::sleep(Duration::from_millis(400));
    input.push(());
    std::thread::sleep(Duration::from_millis(2600));
    input.push(());
    std::thread::sleep(Duration::from_millis(100));

    let remaining = scheduler.threads();
    assert!(remaining <= 1, "expected the pool to have decayed, got {remaining}");

    scheduler.stop();
    assert_eq!(scheduler.threads(), 0);
}
