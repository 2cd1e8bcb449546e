//! Queue backlog health monitor
//!
//! Watches the queue depth after every dispatched event. Once the depth has
//! stayed above the warning threshold for longer than the grace period
//! (`5s * threshold / 100`), every further observation logs a warning until
//! the depth falls back below the threshold.

use std::time::{Duration, Instant};
use tracing::warn;

/// Grace period per 100 events of threshold
const GRACE_PER_HUNDRED: Duration = Duration::from_secs(5);

/// Result of one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BacklogStatus {
    /// Not over the threshold
    Normal,
    /// Just went over the threshold; grace timer started
    Entered,
    /// Over the threshold, still within the grace period
    Elevated,
    /// Over the threshold for longer than the grace period; warning logged
    Sustained,
    /// Dropped back below the threshold
    Recovered,
}

/// Tracks how long the queue has been over its warning threshold
#[derive(Debug, Clone)]
pub struct BacklogMonitor {
    threshold: usize,
    grace: Duration,
    over_since: Option<Instant>,
}

impl BacklogMonitor {
    /// Create a monitor for the given warning threshold
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            grace: GRACE_PER_HUNDRED.mul_f64(threshold as f64 / 100.0),
            over_since: None,
        }
    }

    /// Observe the current depth now
    pub fn observe(&mut self, depth: usize) -> BacklogStatus {
        self.observe_at(depth, Instant::now())
    }

    /// Observe the current depth at an explicit instant
    pub fn observe_at(&mut self, depth: usize, now: Instant) -> BacklogStatus {
        let Some(since) = self.over_since else {
            if depth > self.threshold {
                self.over_since = Some(now);
                return BacklogStatus::Entered;
            }
            return BacklogStatus::Normal;
        };

        if depth < self.threshold {
            self.over_since = None;
            return BacklogStatus::Recovered;
        }

        if now.saturating_duration_since(since) > self.grace {
            warn!(
                "Webhook queue has been > {} (@{}) for over {:?}, \
                 try increasing the webhook concurrency or worker count",
                self.threshold, depth, self.grace
            );
            return BacklogStatus::Sustained;
        }

        BacklogStatus::Elevated
    }

    /// Whether the monitor currently considers the queue over threshold
    pub fn is_over_threshold(&self) -> bool {
        self.over_since.is_some()
    }

    /// Warning threshold
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Grace period before warnings start
    pub fn grace_period(&self) -> Duration {
        self.grace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grace_scales_with_threshold() {
        assert_eq!(BacklogMonitor::new(100).grace_period(), Duration::from_secs(5));
        assert_eq!(BacklogMonitor::new(200).grace_period(), Duration::from_secs(10));
        assert_eq!(BacklogMonitor::new(50).grace_period(), Duration::from_millis(2500));
    }

    #[test]
    fn sustained_overload_warns_once_per_observation() {
        let mut monitor = BacklogMonitor::new(100);
        let t0 = Instant::now();

        assert_eq!(monitor.observe_at(150, t0), BacklogStatus::Entered);
        assert_eq!(
            monitor.observe_at(150, t0 + Duration::from_secs(6)),
            BacklogStatus::Sustained
        );
    }

    #[test]
    fn recovery_within_grace_clears_without_warning() {
        let mut monitor = BacklogMonitor::new(100);
        let t0 = Instant::now();

        assert_eq!(monitor.observe_at(150, t0), BacklogStatus::Entered);
        assert_eq!(
            monitor.observe_at(150, t0 + Duration::from_secs(2)),
            BacklogStatus::Elevated
        );
        assert_eq!(
            monitor.observe_at(50, t0 + Duration::from_secs(4)),
            BacklogStatus::Recovered
        );
        assert!(!monitor.is_over_threshold());
        assert_eq!(
            monitor.observe_at(50, t0 + Duration::from_secs(6)),
            BacklogStatus::Normal
        );
    }

    #[test]
    fn warning_repeats_while_overloaded() {
        let mut monitor = BacklogMonitor::new(100);
        let t0 = Instant::now();

        monitor.observe_at(150, t0);
        for secs in 6..10 {
            assert_eq!(
                monitor.observe_at(150, t0 + Duration::from_secs(secs)),
                BacklogStatus::Sustained
            );
        }
    }

    #[test]
    fn depth_equal_to_threshold_neither_enters_nor_clears() {
        let mut monitor = BacklogMonitor::new(100);
        let t0 = Instant::now();

        assert_eq!(monitor.observe_at(100, t0), BacklogStatus::Normal);
        monitor.observe_at(101, t0);
        assert_eq!(
            monitor.observe_at(100, t0 + Duration::from_secs(1)),
            BacklogStatus::Elevated
        );
        assert!(monitor.is_over_threshold());
    }
}
