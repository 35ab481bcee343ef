use std::sync::atomic::{AtomicU64, Ordering};

// Counters for one rule. Shared by its two hooks and by every deferred task
// the rule spawns, hence atomics rather than the thread-local counters a
// single-threaded pipeline could get away with.
#[derive(Debug, Default)]
pub struct RuleMetrics {
    /// Hook invocations (one per insert/update event seen)
    fired: AtomicU64,
    /// Recomputes skipped because no watched field changed
    skipped: AtomicU64,
    /// Cached field writes issued
    written: AtomicU64,
    /// Derive function failures
    derive_failures: AtomicU64,
    /// Scoped update failures
    write_failures: AtomicU64,
}

impl RuleMetrics {
    pub fn record_fired(&self) {
        self.fired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_written(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_derive_failure(&self) {
        self.derive_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RuleStats {
        RuleStats {
            fired: self.fired.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            derive_failures: self.derive_failures.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a rule's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleStats {
    pub fired: u64,
    pub skipped: u64,
    pub written: u64,
    pub derive_failures: u64,
    pub write_failures: u64,
}

impl RuleStats {
    /// Deferred tasks that have finished, whatever the outcome
    pub fn completed(&self) -> u64 {
        self.skipped + self.written + self.derive_failures + self.write_failures
    }

    /// Fraction of completed recomputes that were no-ops
    pub fn skip_rate(&self) -> f64 {
        let total = self.completed();
        if total == 0 {
            0.0
        } else {
            self.skipped as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let metrics = RuleMetrics::default();
        metrics.record_fired();
        metrics.record_fired();
        metrics.record_fired();
        metrics.record_skipped();
        metrics.record_written();
        metrics.record_write_failure();

        let stats = metrics.snapshot();
        assert_eq!(stats.fired, 3);
        assert_eq!(stats.completed(), 3);
        assert!((stats.skip_rate() - 1.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_skip_rate_empty() {
        assert_eq!(RuleStats::default().skip_rate(), 0.0);
    }
}
