// # Memory Event Queue
//
// In-memory implementation of EventQueue.
//
// ## Purpose
//
// Connects producers on any task to the single dispatch loop. Producers hold
// cloneable `QueueHandle`s; the queue closes once every handle is dropped and
// the remaining events have been popped.
//
// ## Accounting
//
// - `depth()` counts events pushed but not yet popped
// - `join()` resolves once every pushed event has been acknowledged with
//   `task_done()`
//
// ## Crash Behavior
//
// - Queued events are lost on restart/crash
// - No durability is attempted

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, mpsc};
use tracing::warn;

use crate::error::{Error, Result};
use crate::event::WebhookEvent;
use crate::traits::EventQueue;

#[derive(Debug, Default)]
struct Counters {
    /// Pushed, not yet popped
    waiting: AtomicUsize,
    /// Pushed, not yet acknowledged
    unfinished: AtomicUsize,
    /// Signalled when `unfinished` drops to zero
    idle: Notify,
}

impl Counters {
    async fn join(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.unfinished.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// In-memory FIFO event queue
///
/// # Example
///
/// ```rust,no_run
/// use hookcast_core::queue::MemoryQueue;
/// use hookcast_core::traits::EventQueue;
/// use hookcast_core::WebhookEvent;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let (queue, handle) = MemoryQueue::new();
///
///     handle.push(WebhookEvent::from_json_line(
///         r#"{"type":"gym","message":{"gym_id":"g-1"}}"#,
///     )?)?;
///     assert_eq!(queue.depth(), 1);
///
///     let event = queue.pop().await;
///     assert!(event.is_some());
///     queue.task_done();
///
///     handle.join().await;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MemoryQueue {
    rx: Mutex<mpsc::UnboundedReceiver<WebhookEvent>>,
    counters: Arc<Counters>,
}

/// Producer side of a [`MemoryQueue`]
#[derive(Debug, Clone)]
pub struct QueueHandle {
    tx: mpsc::UnboundedSender<WebhookEvent>,
    counters: Arc<Counters>,
}

impl MemoryQueue {
    /// Create a new empty queue and its first producer handle
    pub fn new() -> (Self, QueueHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());

        let queue = Self {
            rx: Mutex::new(rx),
            counters: Arc::clone(&counters),
        };
        let handle = QueueHandle { tx, counters };

        (queue, handle)
    }

    /// Number of events pushed but not yet acknowledged
    pub fn unfinished(&self) -> usize {
        self.counters.unfinished.load(Ordering::SeqCst)
    }

    /// Wait until every pushed event has been acknowledged
    pub async fn join(&self) {
        self.counters.join().await
    }
}

impl QueueHandle {
    /// Enqueue an event
    ///
    /// # Errors
    ///
    /// `Error::Queue` if the queue has been dropped.
    pub fn push(&self, event: WebhookEvent) -> Result<()> {
        self.counters.unfinished.fetch_add(1, Ordering::SeqCst);
        self.counters.waiting.fetch_add(1, Ordering::SeqCst);

        if self.tx.send(event).is_err() {
            self.counters.waiting.fetch_sub(1, Ordering::SeqCst);
            self.counters.unfinished.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::queue("queue is closed"));
        }

        Ok(())
    }

    /// Number of events waiting to be popped
    pub fn depth(&self) -> usize {
        self.counters.waiting.load(Ordering::SeqCst)
    }

    /// Wait until every pushed event has been acknowledged
    pub async fn join(&self) {
        self.counters.join().await
    }
}

#[async_trait]
impl EventQueue for MemoryQueue {
    async fn pop(&self) -> Option<WebhookEvent> {
        let event = self.rx.lock().await.recv().await?;
        self.counters.waiting.fetch_sub(1, Ordering::SeqCst);
        Some(event)
    }

    fn depth(&self) -> usize {
        self.counters.waiting.load(Ordering::SeqCst)
    }

    fn task_done(&self) {
        let result = self
            .counters
            .unfinished
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));

        match result {
            Ok(1) => self.counters.idle.notify_waiters(),
            Ok(_) => {}
            Err(_) => warn!("task_done() called more times than events were pushed"),
        }
    }
}
