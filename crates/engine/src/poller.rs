use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use lazarus_health::{HealthGate, HealthSnapshot};

use crate::metrics::ReplayMetrics;

/// Count a tick and consult the health gate.
///
/// Returns the snapshot and whether replay may proceed.
pub(crate) async fn gated_tick(gate: &HealthGate, metrics: &ReplayMetrics) -> (HealthSnapshot, bool) {
    metrics.increment_ticks();
    let snapshot = gate.check().await;
    let healthy = snapshot.is_healthy();
    if !healthy {
        metrics.increment_ticks_skipped_unhealthy();
        warn!(
            failing = ?snapshot.failing(),
            probes = snapshot.checks.len(),
            "dependencies unhealthy, skipping replay tick"
        );
    }
    (snapshot, healthy)
}

/// Fires the per-queue workers on a fixed interval while dependencies are
/// healthy. An unhealthy tick signals nobody.
pub struct Poller {
    gate: HealthGate,
    ticks: watch::Sender<u64>,
    period: Duration,
    metrics: Arc<ReplayMetrics>,
}

impl Poller {
    pub fn new(
        gate: HealthGate,
        ticks: watch::Sender<u64>,
        period: Duration,
        metrics: Arc<ReplayMetrics>,
    ) -> Self {
        Self {
            gate,
            ticks,
            period,
            metrics,
        }
    }

    /// Tick until `cancel` fires. The first tick is immediate.
    pub async fn run(&self, cancel: &CancellationToken) {
        let mut timer = interval(self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(period = ?self.period, "poller started");

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!("poller received shutdown signal");
                    break;
                }
                _ = timer.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    /// Run one tick. Returns whether workers were signalled.
    pub async fn tick(&self) -> bool {
        let (_, healthy) = gated_tick(&self.gate, &self.metrics).await;
        if healthy {
            self.ticks.send_modify(|n| *n = n.wrapping_add(1));
            debug!(tick = *self.ticks.borrow(), "workers signalled");
        }
        healthy
    }
}

#[cfg(test)]
mod tests {
    use lazarus_health::StaticProbe;

    use super::*;

    #[tokio::test]
    async fn healthy_tick_signals_workers() {
        let (tx, mut rx) = watch::channel(0u64);
        let gate = HealthGate::default().with_probe(Arc::new(StaticProbe::healthy("postgres")));
        let metrics = Arc::new(ReplayMetrics::default());
        let poller = Poller::new(gate, tx, Duration::from_secs(10), Arc::clone(&metrics));

        assert!(poller.tick().await);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 1);
        assert_eq!(metrics.snapshot().ticks, 1);
    }

    #[tokio::test]
    async fn unhealthy_tick_is_skipped() {
        let (tx, rx) = watch::channel(0u64);
        let probe = Arc::new(StaticProbe::new("redis", false));
        let gate = HealthGate::default().with_probe(probe);
        let metrics = Arc::new(ReplayMetrics::default());
        let poller = Poller::new(gate, tx, Duration::from_secs(10), Arc::clone(&metrics));

        assert!(!poller.tick().await);
        assert!(!rx.has_changed().unwrap());
        let snap = metrics.snapshot();
        assert_eq!(snap.ticks, 1);
        assert_eq!(snap.ticks_skipped_unhealthy, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_ticks_on_interval_until_cancelled() {
        let (tx, _rx) = watch::channel(0u64);
        let gate = HealthGate::default().with_probe(Arc::new(StaticProbe::healthy("postgres")));
        let metrics = Arc::new(ReplayMetrics::default());
        let poller = Arc::new(Poller::new(gate, tx, Duration::from_secs(10), Arc::clone(&metrics)));
        let cancel = CancellationToken::new();

        let task = {
            let poller = Arc::clone(&poller);
            let cancel = cancel.clone();
            tokio::spawn(async move { poller.run(&cancel).await })
        };

        // Ticks at 0s, 10s, 20s.
        tokio::time::sleep(Duration::from_secs(25)).await;
        cancel.cancel();
        task.await.unwrap();
        assert_eq!(metrics.snapshot().ticks, 3);
    }
}
