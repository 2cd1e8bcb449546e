//! Configuration types for the hookcast dispatch worker
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Main dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Destination endpoint URLs
    #[serde(default)]
    pub webhooks: Vec<String>,

    /// Per-request read timeout (in seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,

    /// Retries on transient failures (0 disables retrying)
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Backoff factor: the sleep before retry n is `factor * 2^(n-1)` seconds
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Connection pool size and maximum in-flight deliveries
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Species ids suppressed unless the event is flagged exceptional
    #[serde(default)]
    pub encounter_blacklist: Vec<u16>,

    /// Queue depth above which the backlog monitor starts its grace timer
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: usize,

    /// Maximum number of identities kept by the dedup cache
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Capacity of the internal monitoring event channel
    ///
    /// When full, new dispatch events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Quality threshold overrides
    #[serde(default)]
    pub filter: FilterConfig,
}

impl DispatchConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            webhooks: Vec::new(),
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            backoff_factor: default_backoff_factor(),
            concurrency: default_concurrency(),
            encounter_blacklist: Vec::new(),
            warning_threshold: default_warning_threshold(),
            cache_capacity: default_cache_capacity(),
            event_channel_capacity: default_event_channel_capacity(),
            filter: FilterConfig::default(),
        }
    }

    /// Set the endpoint list
    pub fn with_webhooks<I, S>(mut self, webhooks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.webhooks = webhooks.into_iter().map(Into::into).collect();
        self
    }

    /// Validate the configuration
    ///
    /// An empty endpoint list is allowed; the worker then drains the queue
    /// and drops every qualifying event with a warning.
    pub fn validate(&self) -> Result<(), crate::Error> {
        for url in &self.webhooks {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(crate::Error::config(format!(
                    "Webhook URL must use HTTP or HTTPS scheme: {}",
                    url
                )));
            }
        }

        if !self.timeout_secs.is_finite() || self.timeout_secs <= 0.0 {
            return Err(crate::Error::config("Webhook timeout must be > 0"));
        }

        if !self.backoff_factor.is_finite() || self.backoff_factor < 0.0 {
            return Err(crate::Error::config("Backoff factor must be >= 0"));
        }

        if self.concurrency == 0 {
            return Err(crate::Error::config("Webhook concurrency must be > 0"));
        }

        if self.cache_capacity == 0 {
            return Err(crate::Error::config("Dedup cache capacity must be > 0"));
        }

        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }

        self.filter.validate()?;

        Ok(())
    }

    /// Per-request read timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Overrides applied on top of the built-in quality threshold table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Replaces the table's global default threshold
    #[serde(default)]
    pub default_threshold: Option<u8>,

    /// Per-species thresholds, replacing table entries
    #[serde(default)]
    pub overrides: BTreeMap<u16, u8>,
}

impl FilterConfig {
    /// Validate that every threshold is a percentage
    pub fn validate(&self) -> Result<(), crate::Error> {
        if let Some(default) = self.default_threshold
            && default > 100
        {
            return Err(crate::Error::config(format!(
                "Default quality threshold must be 0-100, got {}",
                default
            )));
        }

        if let Some((species, threshold)) = self.overrides.iter().find(|(_, t)| **t > 100) {
            return Err(crate::Error::config(format!(
                "Quality threshold for species {} must be 0-100, got {}",
                species, threshold
            )));
        }

        Ok(())
    }
}

fn default_timeout_secs() -> f64 {
    1.0
}

fn default_retries() -> u32 {
    3
}

fn default_backoff_factor() -> f64 {
    0.25
}

fn default_concurrency() -> usize {
    25
}

fn default_warning_threshold() -> usize {
    100
}

fn default_cache_capacity() -> usize {
    2500
}

fn default_event_channel_capacity() -> usize {
    1000
}
