//! Error types for the hookcast dispatch worker
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for hookcast operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the hookcast dispatch worker
#[derive(Error, Debug)]
pub enum Error {
    /// Event queue errors
    #[error("Queue error: {0}")]
    Queue(String),

    /// Webhook delivery errors
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// Dedup cache errors
    #[error("Cache error: {0}")]
    Cache(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed event (missing type, non-object message, ...)
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),
}

impl Error {
    /// Create a queue error
    pub fn queue(msg: impl Into<String>) -> Self {
        Self::Queue(msg.into())
    }

    /// Create a delivery error
    pub fn delivery(msg: impl Into<String>) -> Self {
        Self::Delivery(msg.into())
    }

    /// Create a cache error
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid event error
    pub fn invalid_event(msg: impl Into<String>) -> Self {
        Self::InvalidEvent(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }
}
