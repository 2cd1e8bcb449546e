//! Contract Test: Failure Isolation
//!
//! This test verifies that a failing iteration never stops the dispatch loop.
//!
//! Constraints verified:
//! - A sink error is reported as IterationFailed
//! - Later events are still processed
//! - The failed event is still acknowledged on the queue
//!
//! If this test fails, someone has let an error escape the loop body.

mod common;

use common::*;
use hookcast_core::engine::DispatchEvent;

#[tokio::test]
async fn sink_error_does_not_stop_the_loop() {
    let sink = RecordingSink::failing_for(&["g-bad"]);
    let engine = start_engine(
        RecordingSink::sharing_counters_with(&sink),
        lfu_cache(),
        minimal_config(),
    );

    // feed() only returns once every event has been acknowledged
    engine
        .feed([gym("g-1", 1, 0), gym("g-bad", 1, 0), gym("g-2", 1, 0)])
        .await;
    let emitted = engine.stop().await;

    assert_eq!(sink.dispatch_call_count(), 3, "all three reach the sink");
    assert_eq!(sink.dispatched().len(), 2, "only the failing one is lost");
    assert_eq!(
        count(&emitted, |e| matches!(e, DispatchEvent::IterationFailed { .. })),
        1
    );
    assert_eq!(
        count(&emitted, |e| matches!(e, DispatchEvent::Delivered { .. })),
        2
    );
}

#[tokio::test]
async fn failed_identity_is_still_cached() {
    let sink = RecordingSink::failing_for(&["g-bad"]);
    let engine = start_engine(
        RecordingSink::sharing_counters_with(&sink),
        lfu_cache(),
        minimal_config(),
    );

    // The cache is updated before delivery, so the unchanged repeat is suppressed
    engine
        .feed([gym("g-bad", 1, 0), gym("g-bad", 1, 0)])
        .await;
    let emitted = engine.stop().await;

    assert_eq!(sink.dispatch_call_count(), 1);
    assert_eq!(
        count(&emitted, |e| matches!(e, DispatchEvent::Suppressed { .. })),
        1
    );
}

#[tokio::test]
async fn repeated_failures_keep_the_engine_alive() {
    let sink = RecordingSink::failing_for(&["g-bad"]);
    let engine = start_engine(
        RecordingSink::sharing_counters_with(&sink),
        lfu_cache(),
        minimal_config(),
    );

    for team in 0..5 {
        engine.feed([gym("g-bad", team, 0)]).await;
    }
    engine.feed([gym("g-ok", 1, 0)]).await;
    let emitted = engine.stop().await;

    assert_eq!(
        count(&emitted, |e| matches!(e, DispatchEvent::IterationFailed { .. })),
        5
    );
    assert_eq!(sink.dispatched().len(), 1);
}
