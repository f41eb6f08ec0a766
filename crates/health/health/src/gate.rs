use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::HealthError;
use crate::probe::HealthProbe;

/// Default per-probe timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeStatus {
    pub name: String,
    pub healthy: bool,
    pub latency: Duration,
    pub error: Option<String>,
}

/// Result of one health check across all configured probes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthSnapshot {
    pub checks: Vec<ProbeStatus>,
}

impl HealthSnapshot {
    /// Healthy only when at least one probe ran and every probe passed.
    pub fn is_healthy(&self) -> bool {
        !self.checks.is_empty() && self.checks.iter().all(|c| c.healthy)
    }

    /// Names of the probes that failed.
    pub fn failing(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|c| !c.healthy)
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// Aggregates the configured [`HealthProbe`]s into a single verdict.
///
/// Unconfigured dependencies are simply absent from the gate. A gate with no
/// probes at all never reports healthy.
#[derive(Clone)]
pub struct HealthGate {
    probes: Vec<Arc<dyn HealthProbe>>,
    timeout: Duration,
}

impl HealthGate {
    pub fn new(timeout: Duration) -> Self {
        Self {
            probes: Vec::new(),
            timeout,
        }
    }

    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probes.push(probe);
        self
    }

    pub fn probe_count(&self) -> usize {
        self.probes.len()
    }

    /// Ping every probe concurrently and collect the results.
    ///
    /// Never cached: every call performs fresh round trips.
    pub async fn check(&self) -> HealthSnapshot {
        if self.probes.is_empty() {
            warn!("no health dependencies configured, gate is closed");
        }

        let checks = join_all(self.probes.iter().map(|probe| self.run_probe(probe.as_ref()))).await;
        let snapshot = HealthSnapshot { checks };

        for check in snapshot.checks.iter().filter(|c| !c.healthy) {
            warn!(
                dependency = %check.name,
                error = check.error.as_deref().unwrap_or_default(),
                "dependency unhealthy"
            );
        }
        snapshot
    }

    async fn run_probe(&self, probe: &dyn HealthProbe) -> ProbeStatus {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.timeout, probe.ping()).await {
            Ok(result) => result,
            Err(_) => Err(HealthError::Timeout(self.timeout)),
        };
        let latency = started.elapsed();
        debug!(dependency = probe.name(), ?latency, ok = result.is_ok(), "health probe");

        ProbeStatus {
            name: probe.name().to_owned(),
            healthy: result.is_ok(),
            latency,
            error: result.err().map(|e| e.to_string()),
        }
    }
}

impl Default for HealthGate {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

impl std::fmt::Debug for HealthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.probes.iter().map(|p| p.name()).collect();
        f.debug_struct("HealthGate")
            .field("probes", &names)
            .field("timeout", &self.timeout)
            .finish()
    }
}
