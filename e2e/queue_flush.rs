//! Scenario 4 — queue flush semantics: push three items, close, pop four
//! times — the fourth pop must report the flushed signal.

use pipeworks::error::QueueSignal;
use pipeworks::BoundedQueue;

#[test]
fn fourth_pop_after_close_is_flushed() {
    let queue = BoundedQueue::new(8);
    assert!(queue.push("one"));
    assert!(queue.push("two"));
    assert!(queue.push("three"));
    queue.close();

    assert_eq!(queue.pop(), (Some("one"), QueueSignal::Item));
    assert_eq!(queue.pop(), (Some("two"), QueueSignal::Item));
    assert_eq!(queue.pop(), (Some("three"), QueueSignal::Item));
    assert_eq!(queue.pop(), (None, QueueSignal::Flushed));
}
