// # Dedup Cache Trait
//
// Bounded mapping from identity key to the last snapshot seen for it.
//
// Implementations are NOT required to be internally synchronized. The engine
// owns a single exclusive lock and holds it across the whole
// "read, decide, write" sequence for one event.

use crate::event::{IdentityKey, WebhookEvent};

/// Trait for dedup cache implementations
///
/// # Bounds
///
/// `len()` never exceeds `capacity()`. Which entry is evicted is the
/// implementation's choice; `get` and `put` must be O(1) amortized.
pub trait DedupCache: Send {
    /// Look up the stored snapshot. Counts as a use for eviction bookkeeping.
    fn get(&mut self, key: &IdentityKey) -> Option<&WebhookEvent>;

    /// Insert or overwrite a snapshot, returning the previous one.
    /// Counts as a use whether or not the value changed.
    fn put(&mut self, key: IdentityKey, event: WebhookEvent) -> Option<WebhookEvent>;

    /// Number of stored identities
    fn len(&self) -> usize;

    /// Maximum number of stored identities
    fn capacity(&self) -> usize;

    /// Whether the cache is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
