// # Event Queue Trait
//
// Defines the interface the dispatch loop drains.
//
// ## Contract
//
// - `pop()` is the only point where the dispatch loop blocks
// - `depth()` reports items still waiting (not the one being processed)
// - `task_done()` is called exactly once per popped item, whatever the outcome
//
// ## Usage
//
// ```rust,ignore
// use hookcast_core::EventQueue;
//
// while let Some(event) = queue.pop().await {
//     handle(event);
//     queue.task_done();
// }
// ```

use async_trait::async_trait;

use crate::event::WebhookEvent;

/// Trait for event queue implementations
///
/// Implementations must be thread-safe; producers live on other tasks.
///
/// # Ordering
///
/// Events are yielded in the order they were enqueued.
#[async_trait]
pub trait EventQueue: Send + Sync {
    /// Wait for the next event
    ///
    /// # Returns
    ///
    /// - `Some(event)`: The next event in FIFO order
    /// - `None`: Every producer is gone and the queue is drained
    async fn pop(&self) -> Option<WebhookEvent>;

    /// Number of events waiting to be popped
    fn depth(&self) -> usize;

    /// Acknowledge that the most recently popped event has been processed
    fn task_done(&self);
}
