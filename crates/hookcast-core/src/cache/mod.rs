// # Dedup Cache Implementations
//
// This module provides implementations of the DedupCache trait.

pub mod lfu;

pub use lfu::LfuCache;
