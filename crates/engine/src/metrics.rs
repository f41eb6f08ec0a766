use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters tracking replay outcomes.
///
/// All counters use relaxed ordering. For a consistent point-in-time view,
/// call [`snapshot`](Self::snapshot).
#[derive(Debug, Default)]
pub struct ReplayMetrics {
    /// Supervisory ticks fired.
    pub ticks: AtomicU64,
    /// Ticks skipped because a dependency was unhealthy.
    pub ticks_skipped_unhealthy: AtomicU64,
    /// Messages republished to their origin queue and removed from the DLQ.
    pub replayed: AtomicU64,
    /// Messages requeued because their backoff had not elapsed.
    pub deferred: AtomicU64,
    /// Messages dropped because their replay target was not registered.
    pub security_rejected: AtomicU64,
    /// Messages dropped because their retry budget was exhausted.
    pub permanently_lost: AtomicU64,
    /// Replays that failed to publish or confirm and were requeued.
    pub replay_failed: AtomicU64,
    /// Queue passes aborted during channel setup.
    pub setup_failures: AtomicU64,
    /// Workers restarted by the supervisor.
    pub worker_restarts: AtomicU64,
}

impl ReplayMetrics {
    pub fn increment_ticks(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_ticks_skipped_unhealthy(&self) {
        self.ticks_skipped_unhealthy.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_replayed(&self) {
        self.replayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_deferred(&self) {
        self.deferred.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_security_rejected(&self) {
        self.security_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_permanently_lost(&self) {
        self.permanently_lost.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_replay_failed(&self) {
        self.replay_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_setup_failures(&self) {
        self.setup_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_worker_restarts(&self) {
        self.worker_restarts.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            ticks_skipped_unhealthy: self.ticks_skipped_unhealthy.load(Ordering::Relaxed),
            replayed: self.replayed.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
            security_rejected: self.security_rejected.load(Ordering::Relaxed),
            permanently_lost: self.permanently_lost.load(Ordering::Relaxed),
            replay_failed: self.replay_failed.load(Ordering::Relaxed),
            setup_failures: self.setup_failures.load(Ordering::Relaxed),
            worker_restarts: self.worker_restarts.load(Ordering::Relaxed),
        }
    }
}

/// A plain data snapshot of [`ReplayMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub ticks: u64,
    pub ticks_skipped_unhealthy: u64,
    pub replayed: u64,
    pub deferred: u64,
    pub security_rejected: u64,
    pub permanently_lost: u64,
    pub replay_failed: u64,
    pub setup_failures: u64,
    pub worker_restarts: u64,
}
