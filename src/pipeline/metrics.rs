use std::sync::atomic::{AtomicU64, Ordering};
use super::state::{JobOutcome, JobStatus};

/// Shared counters for one job. Updated by the pool, read by status queries.
#[derive(Debug, Default)]
pub struct JobCounters {
    dispatched: AtomicU64,
    completed: AtomicU64,
    findings: AtomicU64,
}

impl JobCounters {
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn findings(&self) -> u64 {
        self.findings.load(Ordering::Relaxed)
    }

    pub fn add_dispatched(&self, n: u64) {
        self.dispatched.fetch_add(n, Ordering::Relaxed);
    }

    /// Returns the new completed total.
    pub fn add_completed(&self, n: u64) -> u64 {
        self.completed.fetch_add(n, Ordering::Relaxed) + n
    }

    pub fn add_findings(&self, n: u64) {
        self.findings.fetch_add(n, Ordering::Relaxed);
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            dispatched: self.dispatched(),
            completed: self.completed(),
            findings: self.findings(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub dispatched: u64,
    pub completed: u64,
    pub findings: u64,
}

pub fn compute_outcome(
    status: JobStatus,
    stats: PoolStats,
    duration_ms: u64,
    error: Option<String>,
) -> JobOutcome {
    JobOutcome {
        status,
        dispatched: stats.dispatched,
        completed: stats.completed,
        findings: stats.findings,
        duration_ms,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let counters = JobCounters::default();
        counters.add_dispatched(3);
        assert_eq!(counters.add_completed(1), 1);
        assert_eq!(counters.add_completed(2), 3);
        counters.add_findings(1);
        assert_eq!(counters.stats(), PoolStats { dispatched: 3, completed: 3, findings: 1 });
    }

    #[test]
    fn test_compute_outcome_copies_stats() {
        let stats = PoolStats { dispatched: 10, completed: 7, findings: 2 };
        let outcome = compute_outcome(JobStatus::Cancelled, stats, 55, None);
        assert_eq!(outcome.status, JobStatus::Cancelled);
        assert_eq!(outcome.completed, 7);
        assert_eq!(outcome.findings, 2);
        assert_eq!(outcome.duration_ms, 55);
    }
}
