// # Webhook Sink Trait
//
// Defines the delivery side of the dispatch loop.
//
// ## Contract
//
// `dispatch()` hands an event over for delivery to every configured endpoint
// and returns immediately. The engine never waits for, or inspects, the
// outcome of a delivery. Per-endpoint failures are the sink's to log.
//
// ## Implementations
//
// - `hookcast-http`: pooled reqwest client with bounded retries

use crate::error::Result;
use crate::event::WebhookEvent;

/// Trait for delivery implementations
///
/// # Threading
///
/// `dispatch()` is called from the dispatch loop while the dedup lock is
/// held, so it must not block. Network I/O belongs on spawned tasks.
pub trait WebhookSink: Send + Sync {
    /// Start delivering `event` to every endpoint
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Delivery was handed off (not necessarily completed)
    /// - `Err(Error)`: The event could not be handed off (e.g. encoding failed)
    fn dispatch(&self, event: &WebhookEvent) -> Result<()>;

    /// Sink name (for logging)
    fn sink_name(&self) -> &'static str;
}
