//! Core dispatch engine
//!
//! The DispatchEngine is responsible for:
//! - Draining the event queue one event at a time
//! - Deduplicating events against the last snapshot seen per identity
//! - Filtering low-quality location-point events
//! - Handing qualifying events to the WebhookSink
//! - Feeding the backlog monitor
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │ EventQueue  │─── WebhookEvent ────┐
//! └─────────────┘                     │
//!                                     ▼
//!                            ┌────────────────┐
//!                            │ DispatchEngine │
//!                            └────────────────┘
//!                                     │
//!         ┌───────────────────────────┼───────────────────────────┐
//!         │                           │                           │
//!         ▼                           ▼                           ▼
//! ┌─────────────┐           ┌──────────────┐           ┌─────────────┐
//! │ DedupCache  │           │ QualityFilter│           │ WebhookSink │
//! │ (+ change)  │           │              │           │ (dispatch)  │
//! └─────────────┘           └──────────────┘           └─────────────┘
//! ```
//!
//! ## Event Flow
//!
//! 1. Pop the next event (the only blocking point)
//! 2. No identity → deliver unconditionally, skip the cache
//! 3. Under the cache lock: unseen identity → store and deliver; seen
//!    identity → store the new snapshot, deliver only if a significant field
//!    changed
//! 4. Delivery of `pokemon` events additionally requires the quality filter
//! 5. Observe backlog depth, acknowledge the event
//!
//! A failing iteration is logged and the loop moves on to the next event.

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};

use crate::backlog::{BacklogMonitor, BacklogStatus};
use crate::change::has_changed;
use crate::config::DispatchConfig;
use crate::error::Result;
use crate::event::{EventKind, IdentityKey, WebhookEvent};
use crate::filter::{QualityDecision, QualityFilter};
use crate::traits::{DedupCache, EventQueue, WebhookSink};

/// Why an event was handed to the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryReason {
    /// Event carried no identity; delivered without deduplication
    NoIdentity,
    /// Identity was not in the cache
    FirstSeen,
    /// A significant field differs from the cached snapshot
    Changed,
}

/// Events emitted by the DispatchEngine
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    /// Engine started
    Started {
        sink: &'static str,
    },

    /// Event handed to the sink
    Delivered {
        kind: EventKind,
        identity: Option<IdentityKey>,
        reason: DeliveryReason,
    },

    /// Unchanged duplicate, not delivered
    Suppressed {
        identity: IdentityKey,
    },

    /// Rejected by the quality filter
    Filtered {
        identity: Option<IdentityKey>,
        decision: QualityDecision,
    },

    /// An iteration failed; the loop continued
    IterationFailed {
        error: String,
    },

    /// Queue has been over the warning threshold past the grace period
    BacklogSustained {
        depth: usize,
    },

    /// Engine stopped
    Stopped {
        reason: String,
    },
}

/// Core dispatch engine
///
/// The engine is the single consumer of the event queue. Decisions for all
/// identities are serialized under one cache lock; delivery itself runs on
/// the sink's own tasks and is never awaited.
///
/// ## Lifecycle
///
/// 1. Create with [`DispatchEngine::new()`]
/// 2. Start with [`DispatchEngine::run()`]
/// 3. Engine runs until a shutdown signal arrives or the queue closes
pub struct DispatchEngine {
    /// Source of events
    queue: Box<dyn EventQueue>,

    /// Delivery to the configured endpoints
    sink: Box<dyn WebhookSink>,

    /// Identity → last snapshot; the lock spans the whole decide-and-update step
    cache: Mutex<Box<dyn DedupCache>>,

    /// Quality filter for location-point events
    filter: QualityFilter,

    /// Queue depth watchdog
    backlog: Mutex<BacklogMonitor>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<DispatchEvent>,
}

impl DispatchEngine {
    /// Create a new dispatch engine
    ///
    /// # Parameters
    ///
    /// - `queue`: Event queue to drain
    /// - `sink`: Delivery implementation
    /// - `cache`: Dedup cache implementation
    /// - `config`: Dispatch configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields dispatch events
    pub fn new(
        queue: Box<dyn EventQueue>,
        sink: Box<dyn WebhookSink>,
        cache: Box<dyn DedupCache>,
        config: DispatchConfig,
    ) -> Result<(Self, mpsc::Receiver<DispatchEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let engine = Self {
            queue,
            sink,
            cache: Mutex::new(cache),
            filter: QualityFilter::from_config(&config),
            backlog: Mutex::new(BacklogMonitor::new(config.warning_threshold)),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Run the engine
    ///
    /// Drains the queue until Ctrl-C is received or the queue closes.
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Internal run implementation that accepts an optional shutdown signal
    async fn run_internal(
        &self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.emit_event(DispatchEvent::Started {
            sink: self.sink.sink_name(),
        });
        info!("Dispatch engine started (sink: {})", self.sink.sink_name());

        let reason = if let Some(mut rx) = shutdown_rx {
            // Test mode: wait for provided shutdown signal
            loop {
                tokio::select! {
                    next = self.queue.pop() => match next {
                        Some(event) => self.process(event).await,
                        None => break "Queue closed",
                    },

                    _ = &mut rx => break "Shutdown signal",
                }
            }
        } else {
            // Production mode: wait for Ctrl-C
            loop {
                tokio::select! {
                    next = self.queue.pop() => match next {
                        Some(event) => self.process(event).await,
                        None => break "Queue closed",
                    },

                    _ = tokio::signal::ctrl_c() => break "Shutdown signal",
                }
            }
        };

        info!(
            "{}, dispatch engine stopped ({} identities cached)",
            reason,
            self.cache.lock().await.len()
        );
        self.emit_event(DispatchEvent::Stopped {
            reason: reason.to_string(),
        });

        Ok(())
    }

    /// One loop iteration. Never fails; always acknowledges the event.
    async fn process(&self, event: WebhookEvent) {
        if let Err(e) = self.handle_event(event).await {
            error!("Exception in dispatch loop: {}", e);
            self.emit_event(DispatchEvent::IterationFailed {
                error: e.to_string(),
            });
        }

        let depth = self.queue.depth();
        if self.backlog.lock().await.observe(depth) == BacklogStatus::Sustained {
            self.emit_event(DispatchEvent::BacklogSustained { depth });
        }

        self.queue.task_done();
    }

    /// Decide whether an event is delivered
    ///
    /// # Parameters
    ///
    /// - `event`: The event popped from the queue
    async fn handle_event(&self, event: WebhookEvent) -> Result<()> {
        let Some(identity) = event.identity() else {
            debug!("Sending webhook item without identity: {}", event.kind());
            return self.deliver(&event, None, DeliveryReason::NoIdentity);
        };

        let mut cache = self.cache.lock().await;

        let Some(previous) = cache.get(&identity).cloned() else {
            cache.put(identity.clone(), event.clone());
            debug!("Sending {} to webhook: {}", event.kind(), identity);
            return self.deliver(&event, Some(identity), DeliveryReason::FirstSeen);
        };

        // Always refresh so the snapshot tracks the latest sighting
        cache.put(identity.clone(), event.clone());

        if has_changed(event.kind(), &previous, &event) {
            debug!("Sending updated {} to webhook: {}", event.kind(), identity);
            self.deliver(&event, Some(identity), DeliveryReason::Changed)
        } else {
            debug!("Not resending {} to webhook: {}", event.kind(), identity);
            self.emit_event(DispatchEvent::Suppressed { identity });
            Ok(())
        }
    }

    /// Apply the quality filter and hand the event to the sink
    fn deliver(
        &self,
        event: &WebhookEvent,
        identity: Option<IdentityKey>,
        reason: DeliveryReason,
    ) -> Result<()> {
        let decision = self.filter.check(event);
        if !decision.is_pass() {
            self.emit_event(DispatchEvent::Filtered { identity, decision });
            return Ok(());
        }

        self.sink.dispatch(event)?;

        self.emit_event(DispatchEvent::Delivered {
            kind: event.kind().clone(),
            identity,
            reason,
        });
        Ok(())
    }

    /// Emit a dispatch event
    ///
    /// # Parameters
    ///
    /// - `event`: The event to emit
    fn emit_event(&self, event: DispatchEvent) {
        // A dropped receiver means nobody is monitoring; only a full channel is worth a warning
        if let Err(mpsc::error::TrySendError::Full(_)) = self.event_tx.try_send(event) {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }

    /// Run the engine with a caller-controlled shutdown signal
    ///
    /// With `Some(rx)` the engine stops when `rx` fires (or its sender is
    /// dropped) instead of on Ctrl-C. Used by the daemon to stop on SIGTERM
    /// and by the contract tests. `None` behaves like [`run()`](Self::run).
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }
}
