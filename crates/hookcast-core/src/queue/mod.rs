// # Event Queue Implementations
//
// This module provides implementations of the EventQueue trait.

pub mod memory;

pub use memory::{MemoryQueue, QueueHandle};
