// # LFU Dedup Cache
//
// Bounded, memory-resident least-frequently-used cache.
//
// ## Eviction
//
// - The entry with the lowest use count is evicted first
// - Ties go to the entry used least recently
// - `get` and `put` both count as a use
//
// ## Bookkeeping
//
// Every use appends a `(key, stamp)` record to the bucket of the entry's new
// frequency. Older records for the same key go stale and are skipped during
// eviction. When stale records outnumber live entries the buckets are
// compacted in one linear pass, which keeps every operation O(1) amortized.
//
// ## Crash Behavior
//
// Contents are lost on restart. The first sighting of each identity after a
// restart is delivered again.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::Hash;

use crate::error::{Error, Result};
use crate::event::{IdentityKey, WebhookEvent};
use crate::traits::DedupCache;

/// Stale records tolerated beyond the live entry count before compacting
const COMPACTION_SLACK: usize = 64;

#[derive(Debug)]
struct Slot<V> {
    value: V,
    freq: u64,
    stamp: u64,
}

/// Bounded least-frequently-used cache
///
/// # Example
///
/// ```rust
/// use hookcast_core::cache::LfuCache;
///
/// let mut cache = LfuCache::new(2).unwrap();
/// cache.put("a", 1);
/// cache.put("b", 2);
/// cache.get(&"a");
/// cache.put("c", 3); // evicts "b", used once
///
/// assert!(cache.contains_key(&"a"));
/// assert!(!cache.contains_key(&"b"));
/// ```
#[derive(Debug)]
pub struct LfuCache<K, V> {
    capacity: usize,
    entries: HashMap<K, Slot<V>>,
    buckets: BTreeMap<u64, VecDeque<(K, u64)>>,
    queued: usize,
    clock: u64,
}

impl<K, V> LfuCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create a cache holding at most `capacity` entries
    ///
    /// # Errors
    ///
    /// `Error::Cache` if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::cache("LFU cache capacity must be > 0"));
        }

        Ok(Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            buckets: BTreeMap::new(),
            queued: 0,
            clock: 0,
        })
    }

    /// Look up a value, counting the lookup as a use
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.touch(key)?;
        self.entries.get(key).map(|slot| &slot.value)
    }

    /// Look up a value without counting a use
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|slot| &slot.value)
    }

    /// Whether `key` is stored (does not count as a use)
    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or overwrite a value, returning the previous one
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        if let Some(slot) = self.entries.get_mut(&key) {
            let previous = std::mem::replace(&mut slot.value, value);
            self.touch(&key);
            return Some(previous);
        }

        if self.entries.len() >= self.capacity {
            self.evict();
        }

        self.clock += 1;
        let stamp = self.clock;
        self.buckets
            .entry(1)
            .or_default()
            .push_back((key.clone(), stamp));
        self.queued += 1;
        self.entries.insert(
            key,
            Slot {
                value,
                freq: 1,
                stamp,
            },
        );
        self.maybe_compact();

        None
    }

    /// Use count of a stored key
    pub fn frequency(&self, key: &K) -> Option<u64> {
        self.entries.get(key).map(|slot| slot.freq)
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remove and return the least-frequently-used entry
    fn evict(&mut self) -> Option<(K, V)> {
        while let Some(mut bucket) = self.buckets.first_entry() {
            let freq = *bucket.key();
            let Some((key, stamp)) = bucket.get_mut().pop_front() else {
                bucket.remove();
                continue;
            };
            if bucket.get().is_empty() {
                bucket.remove();
            }
            self.queued -= 1;

            let live = self
                .entries
                .get(&key)
                .is_some_and(|slot| slot.freq == freq && slot.stamp == stamp);
            if live {
                let slot = self.entries.remove(&key)?;
                return Some((key, slot.value));
            }
        }

        None
    }

    fn touch(&mut self, key: &K) -> Option<()> {
        let slot = self.entries.get_mut(key)?;
        self.clock += 1;
        slot.freq += 1;
        slot.stamp = self.clock;
        let (freq, stamp) = (slot.freq, slot.stamp);

        self.buckets
            .entry(freq)
            .or_default()
            .push_back((key.clone(), stamp));
        self.queued += 1;
        self.maybe_compact();

        Some(())
    }

    fn maybe_compact(&mut self) {
        if self.queued <= 2 * self.entries.len() + COMPACTION_SLACK {
            return;
        }

        let entries = &self.entries;
        self.buckets.retain(|freq, queue| {
            queue.retain(|(key, stamp)| {
                entries
                    .get(key)
                    .is_some_and(|slot| slot.freq == *freq && slot.stamp == *stamp)
            });
            !queue.is_empty()
        });
        self.queued = self.entries.len();
    }
}

impl DedupCache for LfuCache<IdentityKey, WebhookEvent> {
    fn get(&mut self, key: &IdentityKey) -> Option<&WebhookEvent> {
        LfuCache::get(self, key)
    }

    fn put(&mut self, key: IdentityKey, event: WebhookEvent) -> Option<WebhookEvent> {
        LfuCache::put(self, key, event)
    }

    fn len(&self) -> usize {
        LfuCache::len(self)
    }

    fn capacity(&self) -> usize {
        LfuCache::capacity(self)
    }
}
