//! Core traits for the hookcast dispatch worker
//!
//! This module defines the abstract interfaces the engine is built against.
//!
//! - [`EventQueue`]: Blocking source of events with processed acknowledgement
//! - [`WebhookSink`]: Fire-and-forget delivery to the configured endpoints
//! - [`DedupCache`]: Bounded identity → last snapshot store

pub mod event_queue;
pub mod webhook_sink;
pub mod dedup_cache;

pub use event_queue::EventQueue;
pub use webhook_sink::WebhookSink;
pub use dedup_cache::DedupCache;
