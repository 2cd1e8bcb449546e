//! Contract Test: Deduplication & Change Detection
//!
//! This test verifies that an object is delivered at most once per set of
//! significant field values.
//!
//! Constraints verified:
//! - An unchanged duplicate of a known identity is suppressed
//! - A change to a significant field is delivered again
//! - Volatile fields (e.g. `last_modified`) never trigger a resend
//! - The cached snapshot is refreshed even when delivery is suppressed
//! - Events without an identity are delivered every time
//!
//! If this test fails, dedup state or change detection is broken.

mod common;

use common::*;
use hookcast_core::engine::{DeliveryReason, DispatchEvent};
use hookcast_core::{EventKind, IdentityKey};
use serde_json::json;

#[tokio::test]
async fn duplicate_event_is_delivered_once() {
    let sink = RecordingSink::new();
    let engine = start_engine(
        RecordingSink::sharing_counters_with(&sink),
        lfu_cache(),
        minimal_config(),
    );

    engine.feed([gym("g-1", 1, 100), gym("g-1", 1, 100)]).await;
    let emitted = engine.stop().await;

    assert_eq!(
        sink.dispatch_call_count(),
        1,
        "Expected 1 delivery for 2 identical events, got {}",
        sink.dispatch_call_count()
    );
    assert_eq!(
        count(&emitted, |e| matches!(e, DispatchEvent::Suppressed { .. })),
        1
    );
}

#[tokio::test]
async fn pokestop_lure_change_is_redelivered() {
    let sink = RecordingSink::new();
    let engine = start_engine(
        RecordingSink::sharing_counters_with(&sink),
        lfu_cache(),
        minimal_config(),
    );

    // Identical significant fields twice, then a new lure
    engine
        .feed([
            pokestop("s-1", None, 1),
            pokestop("s-1", None, 1),
            pokestop("s-1", Some(1500000900), 2),
        ])
        .await;
    let emitted = engine.stop().await;

    assert_eq!(sink.dispatch_call_count(), 2);
    let reasons: Vec<DeliveryReason> = emitted
        .iter()
        .filter_map(|e| match e {
            DispatchEvent::Delivered { reason, .. } => Some(*reason),
            _ => None,
        })
        .collect();
    assert_eq!(
        reasons,
        vec![DeliveryReason::FirstSeen, DeliveryReason::Changed]
    );
}

#[tokio::test]
async fn volatile_field_change_is_suppressed() {
    let sink = RecordingSink::new();
    let engine = start_engine(
        RecordingSink::sharing_counters_with(&sink),
        lfu_cache(),
        minimal_config(),
    );

    engine
        .feed([pokestop("s-1", Some(10), 100), pokestop("s-1", Some(10), 200)])
        .await;
    engine.stop().await;

    assert_eq!(
        sink.dispatch_call_count(),
        1,
        "last_modified churn must not cause a resend"
    );
}

#[tokio::test]
async fn suppressed_duplicate_refreshes_snapshot() {
    let sink = RecordingSink::new();
    let cache = ProbedCache::new(16);
    let probe = cache.probe();
    let engine = start_engine(
        RecordingSink::sharing_counters_with(&sink),
        Box::new(cache),
        minimal_config(),
    );

    engine
        .feed([pokestop("s-1", Some(10), 100), pokestop("s-1", Some(10), 200)])
        .await;
    engine.stop().await;

    let key = IdentityKey::new(EventKind::Pokestop, "s-1");
    let snapshots = probe.lock().unwrap();
    let stored = snapshots.get(&key).expect("identity is cached");
    assert_eq!(
        stored.field("last_modified"),
        Some(&json!(200)),
        "cache must hold the most recently seen event"
    );
    assert_eq!(sink.dispatch_call_count(), 1);
}

#[tokio::test]
async fn change_is_measured_against_latest_snapshot() {
    let sink = RecordingSink::new();
    let engine = start_engine(
        RecordingSink::sharing_counters_with(&sink),
        lfu_cache(),
        minimal_config(),
    );

    // team 1 → team 2 → team 1: each step differs from the previous one
    engine
        .feed([gym("g-1", 1, 0), gym("g-1", 2, 0), gym("g-1", 1, 0)])
        .await;
    engine.stop().await;

    assert_eq!(sink.dispatch_call_count(), 3);
}

#[tokio::test]
async fn events_without_identity_are_always_delivered() {
    let sink = RecordingSink::new();
    let engine = start_engine(
        RecordingSink::sharing_counters_with(&sink),
        lfu_cache(),
        minimal_config(),
    );

    let anonymous = || event(EventKind::Gym, json!({"team_id": 1}));
    engine.feed([anonymous(), anonymous(), anonymous()]).await;
    let emitted = engine.stop().await;

    assert_eq!(sink.dispatch_call_count(), 3);
    assert!(emitted.iter().all(|e| !matches!(e, DispatchEvent::Suppressed { .. })));
}

#[tokio::test]
async fn unknown_kinds_are_always_delivered() {
    let sink = RecordingSink::new();
    let engine = start_engine(
        RecordingSink::sharing_counters_with(&sink),
        lfu_cache(),
        minimal_config(),
    );

    let raid = || event(EventKind::Other("raid".into()), json!({"gym_id": "g-1"}));
    engine.feed([raid(), raid()]).await;
    engine.stop().await;

    assert_eq!(sink.dispatch_call_count(), 2);
}

#[tokio::test]
async fn same_id_of_different_kinds_does_not_collide() {
    let sink = RecordingSink::new();
    let engine = start_engine(
        RecordingSink::sharing_counters_with(&sink),
        lfu_cache(),
        minimal_config(),
    );

    engine
        .feed([gym("shared", 1, 0), pokestop("shared", None, 0)])
        .await;
    engine.stop().await;

    assert_eq!(sink.dispatch_call_count(), 2);
}

#[tokio::test]
async fn string_and_numeric_ids_do_not_collide() {
    let sink = RecordingSink::new();
    let engine = start_engine(
        RecordingSink::sharing_counters_with(&sink),
        lfu_cache(),
        minimal_config(),
    );

    let fields = |id: serde_json::Value| json!({"gym_id": id, "team_id": 1, "gym_points": 0});
    engine
        .feed([
            event(EventKind::Gym, fields(json!("7"))),
            event(EventKind::Gym, fields(json!(7))),
        ])
        .await;
    let emitted = engine.stop().await;

    assert_eq!(sink.dispatch_call_count(), 2);
    assert_eq!(
        count(&emitted, |e| matches!(
            e,
            DispatchEvent::Delivered {
                reason: DeliveryReason::FirstSeen,
                ..
            }
        )),
        2
    );
}

#[tokio::test]
async fn evicted_identity_is_treated_as_new() {
    let sink = RecordingSink::new();
    let engine = start_engine(
        RecordingSink::sharing_counters_with(&sink),
        Box::new(ProbedCache::new(1)),
        minimal_config(),
    );

    // Capacity 1: g-2 evicts g-1, so the repeat of g-1 is delivered again
    engine
        .feed([gym("g-1", 1, 0), gym("g-2", 1, 0), gym("g-1", 1, 0)])
        .await;
    engine.stop().await;

    assert_eq!(sink.dispatch_call_count(), 3);
}
