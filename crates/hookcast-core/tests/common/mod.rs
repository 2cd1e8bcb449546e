//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal test doubles that observe the engine's
//! decisions without doing any network I/O.

#![allow(dead_code)]

use hookcast_core::engine::DispatchEvent;
use hookcast_core::error::{Error, Result};
use hookcast_core::traits::{DedupCache, WebhookSink};
use hookcast_core::{
    DispatchConfig, DispatchEngine, EventKind, IdentityKey, LfuCache, MemoryQueue, QueueHandle,
    WebhookEvent,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// A sink that records every dispatched event
pub struct RecordingSink {
    /// Call counter for dispatch()
    dispatch_call_count: Arc<AtomicUsize>,
    /// Events handed to dispatch()
    dispatched: Arc<std::sync::Mutex<Vec<WebhookEvent>>>,
    /// Identity values for which dispatch() fails
    failing_ids: Arc<Vec<String>>,
    /// Blocking delay inside dispatch() (slows the loop down)
    delay: Option<Duration>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            dispatch_call_count: Arc::new(AtomicUsize::new(0)),
            dispatched: Arc::new(std::sync::Mutex::new(Vec::new())),
            failing_ids: Arc::new(Vec::new()),
            delay: None,
        }
    }

    /// Fail dispatch() for events whose identity value is in `ids`
    pub fn failing_for(ids: &[&str]) -> Self {
        Self {
            failing_ids: Arc::new(ids.iter().map(|id| id.to_string()).collect()),
            ..Self::new()
        }
    }

    /// Block inside every dispatch() call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get the number of times dispatch() was called
    pub fn dispatch_call_count(&self) -> usize {
        self.dispatch_call_count.load(Ordering::SeqCst)
    }

    /// Get the events that were dispatched, in order
    pub fn dispatched(&self) -> Vec<WebhookEvent> {
        self.dispatched.lock().unwrap().clone()
    }

    /// Create a new RecordingSink that shares counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            dispatch_call_count: Arc::clone(&other.dispatch_call_count),
            dispatched: Arc::clone(&other.dispatched),
            failing_ids: Arc::clone(&other.failing_ids),
            delay: other.delay,
        }
    }
}

impl WebhookSink for RecordingSink {
    fn dispatch(&self, event: &WebhookEvent) -> Result<()> {
        self.dispatch_call_count.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        if let Some(identity) = event.identity()
            && self.failing_ids.iter().any(|id| id == identity.id())
        {
            return Err(Error::delivery(format!("sink refused {}", identity)));
        }

        self.dispatched.lock().unwrap().push(event.clone());
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "recording"
    }
}

/// An LFU cache that mirrors every stored snapshot for inspection
pub struct ProbedCache {
    inner: LfuCache<IdentityKey, WebhookEvent>,
    snapshots: Arc<std::sync::Mutex<HashMap<IdentityKey, WebhookEvent>>>,
}

impl ProbedCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: LfuCache::new(capacity).expect("non-zero capacity"),
            snapshots: Arc::new(std::sync::Mutex::new(HashMap::new())),
        }
    }

    /// Shared view of the latest snapshot stored per identity
    pub fn probe(&self) -> Arc<std::sync::Mutex<HashMap<IdentityKey, WebhookEvent>>> {
        Arc::clone(&self.snapshots)
    }
}

impl DedupCache for ProbedCache {
    fn get(&mut self, key: &IdentityKey) -> Option<&WebhookEvent> {
        self.inner.get(key)
    }

    fn put(&mut self, key: IdentityKey, event: WebhookEvent) -> Option<WebhookEvent> {
        self.snapshots
            .lock()
            .unwrap()
            .insert(key.clone(), event.clone());
        self.inner.put(key, event)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}

/// A running engine plus the handles a test needs to drive it
pub struct RunningEngine {
    pub queue: QueueHandle,
    pub events: mpsc::Receiver<DispatchEvent>,
    pub shutdown: oneshot::Sender<()>,
    pub handle: JoinHandle<Result<()>>,
}

impl RunningEngine {
    /// Push events and wait until the engine has acknowledged all of them
    pub async fn feed(&self, events: impl IntoIterator<Item = WebhookEvent>) {
        for event in events {
            self.queue.push(event).expect("queue open");
        }
        tokio::time::timeout(Duration::from_secs(5), self.queue.join())
            .await
            .expect("engine drains the queue within 5 seconds");
    }

    /// Stop the engine and return every dispatch event it emitted
    pub async fn stop(mut self) -> Vec<DispatchEvent> {
        let _ = self.shutdown.send(());
        self.handle
            .await
            .expect("engine task joins")
            .expect("engine shuts down cleanly");

        let mut emitted = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            emitted.push(event);
        }
        emitted
    }
}

/// Build and spawn an engine around a fresh MemoryQueue
pub fn start_engine(
    sink: RecordingSink,
    cache: Box<dyn DedupCache>,
    config: DispatchConfig,
) -> RunningEngine {
    let (queue, handle) = MemoryQueue::new();
    let (engine, events) = DispatchEngine::new(Box::new(queue), Box::new(sink), cache, config)
        .expect("engine construction succeeds");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    RunningEngine {
        queue: handle,
        events,
        shutdown: shutdown_tx,
        handle: task,
    }
}

/// Helper to create a minimal DispatchConfig for testing
pub fn minimal_config() -> DispatchConfig {
    let mut config = DispatchConfig::new().with_webhooks(["http://127.0.0.1:9/hook"]);
    config.event_channel_capacity = 1000;
    config.cache_capacity = 100;
    config
}

/// Default LFU cache for tests
pub fn lfu_cache() -> Box<dyn DedupCache> {
    Box::new(LfuCache::<IdentityKey, WebhookEvent>::new(100).expect("non-zero capacity"))
}

pub fn event(kind: EventKind, fields: Value) -> WebhookEvent {
    let Value::Object(map) = fields else {
        panic!("fields must be a JSON object");
    };
    WebhookEvent::new(kind, map)
}

/// A location-point event with the given attribute triple
pub fn pokemon(encounter: &str, species: u16, attrs: (u8, u8, u8), shiny: bool) -> WebhookEvent {
    event(
        EventKind::Pokemon,
        json!({
            "encounter_id": encounter,
            "spawnpoint_id": "sp-1",
            "pokemon_id": species,
            "latitude": 51.5,
            "longitude": -0.12,
            "disappear_time": 1500000000,
            "move_1": 14,
            "move_2": 32,
            "individual_attack": attrs.0,
            "individual_defense": attrs.1,
            "individual_stamina": attrs.2,
            "shiny": shiny,
        }),
    )
}

/// A point-of-interest event
pub fn pokestop(id: &str, lure_expiration: Option<i64>, last_modified: i64) -> WebhookEvent {
    event(
        EventKind::Pokestop,
        json!({
            "pokestop_id": id,
            "enabled": true,
            "latitude": 51.5,
            "longitude": -0.12,
            "lure_expiration": lure_expiration,
            "active_fort_modifier": null,
            "last_modified": last_modified,
        }),
    )
}

/// A contested-area event
pub fn gym(id: &str, team_id: u8, gym_points: u32) -> WebhookEvent {
    event(
        EventKind::Gym,
        json!({
            "gym_id": id,
            "team_id": team_id,
            "guard_pokemon_id": 149,
            "gym_points": gym_points,
            "enabled": true,
            "latitude": 51.5,
            "longitude": -0.12,
        }),
    )
}

/// Count emitted events matching a predicate
pub fn count(events: &[DispatchEvent], pred: impl Fn(&DispatchEvent) -> bool) -> usize {
    events.iter().filter(|e| pred(e)).count()
}
