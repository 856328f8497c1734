use std::sync::atomic::{AtomicU64, Ordering};

use super::gate::SkipReason;

#[derive(Debug, Default)]
pub struct PollerMetrics {
    // Triggers
    pub timer_ticks: AtomicU64,
    pub notifications_received: AtomicU64,

    // Probe path
    pub probes_issued: AtomicU64,
    pub probe_failures: AtomicU64,
    pub changes_detected: AtomicU64,
    pub degradations: AtomicU64,

    // Fetch path
    pub fetches_started: AtomicU64,
    pub fetches_completed: AtomicU64,
    pub fetches_failed: AtomicU64,
    pub skipped_in_flight: AtomicU64,
    pub skipped_throttled: AtomicU64,
    pub skipped_inactive: AtomicU64,

    // Late completions from an ended session
    pub results_discarded: AtomicU64,
}

impl PollerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skip(&self, reason: SkipReason) {
        Self::incr(match reason {
            SkipReason::AlreadyInFlight => &self.skipped_in_flight,
            SkipReason::Throttled => &self.skipped_throttled,
            SkipReason::Inactive => &self.skipped_inactive,
        });
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timer_ticks: self.timer_ticks.load(Ordering::Relaxed),
            notifications_received: self.notifications_received.load(Ordering::Relaxed),
            probes_issued: self.probes_issued.load(Ordering::Relaxed),
            probe_failures: self.probe_failures.load(Ordering::Relaxed),
            changes_detected: self.changes_detected.load(Ordering::Relaxed),
            degradations: self.degradations.load(Ordering::Relaxed),
            fetches_started: self.fetches_started.load(Ordering::Relaxed),
            fetches_completed: self.fetches_completed.load(Ordering::Relaxed),
            fetches_failed: self.fetches_failed.load(Ordering::Relaxed),
            skipped_in_flight: self.skipped_in_flight.load(Ordering::Relaxed),
            skipped_throttled: self.skipped_throttled.load(Ordering::Relaxed),
            skipped_inactive: self.skipped_inactive.load(Ordering::Relaxed),
            results_discarded: self.results_discarded.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub timer_ticks: u64,
    pub notifications_received: u64,
    pub probes_issued: u64,
    pub probe_failures: u64,
    pub changes_detected: u64,
    pub degradations: u64,
    pub fetches_started: u64,
    pub fetches_completed: u64,
    pub fetches_failed: u64,
    pub skipped_in_flight: u64,
    pub skipped_throttled: u64,
    pub skipped_inactive: u64,
    pub results_discarded: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_skip_routes_by_reason() {
        let metrics = PollerMetrics::new();
        metrics.record_skip(SkipReason::Throttled);
        metrics.record_skip(SkipReason::Throttled);
        metrics.record_skip(SkipReason::AlreadyInFlight);
        metrics.record_skip(SkipReason::Inactive);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.skipped_throttled, 2);
        assert_eq!(snapshot.skipped_in_flight, 1);
        assert_eq!(snapshot.skipped_inactive, 1);
        assert_eq!(snapshot.fetches_started, 0);
    }
}
