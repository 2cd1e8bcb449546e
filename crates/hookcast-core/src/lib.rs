// # hookcast-core
//
// Core library for the hookcast webhook dispatch worker.
//
// ## Architecture Overview
//
// This library provides the dispatch decision pipeline:
// - **EventQueue**: Trait for the blocking queue the worker drains
// - **WebhookSink**: Trait for fire-and-forget delivery to endpoints
// - **DedupCache**: Trait for the bounded identity → snapshot store
// - **QualityFilter**: Pure quality gate for location-point events
// - **has_changed**: Significant-field change detection
// - **BacklogMonitor**: Sustained queue overload detection
// - **DispatchEngine**: Single consumer orchestrating all of the above
//
// ## Design Principles
//
// 1. **Isolated Failure**: One bad event never stops the worker
// 2. **Serialized Decisions**: One lock spans each read-decide-write on the cache
// 3. **Fire-and-Forget Delivery**: The loop never waits on the network
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Bounded Memory**: The dedup cache never grows past its capacity

pub mod traits;
pub mod engine;
pub mod config;
pub mod error;
pub mod event;
pub mod filter;
pub mod change;
pub mod cache;
pub mod queue;
pub mod backlog;

// Re-export core types for convenience
pub use traits::{DedupCache, EventQueue, WebhookSink};
pub use engine::{DeliveryReason, DispatchEngine, DispatchEvent};
pub use config::{DispatchConfig, FilterConfig};
pub use error::{Error, Result};
pub use event::{EventKind, IdentityKey, WebhookEvent};
pub use filter::{QualityDecision, QualityFilter, QualityThresholds};
pub use change::has_changed;
pub use cache::LfuCache;
pub use queue::{MemoryQueue, QueueHandle};
pub use backlog::{BacklogMonitor, BacklogStatus};
