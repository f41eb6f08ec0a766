use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::error::HealthError;

/// Liveness check for one downstream dependency.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Short name used in logs and snapshots (e.g. `"postgres"`).
    fn name(&self) -> &str;

    /// Perform a cheap round trip to the dependency.
    async fn ping(&self) -> Result<(), HealthError>;
}

/// A probe whose answer is set by hand.
///
/// Used by tests and by dry runs against the in-memory broker.
#[derive(Debug)]
pub struct StaticProbe {
    name: String,
    healthy: AtomicBool,
}

impl StaticProbe {
    pub fn new(name: impl Into<String>, healthy: bool) -> Self {
        Self {
            name: name.into(),
            healthy: AtomicBool::new(healthy),
        }
    }

    pub fn healthy(name: impl Into<String>) -> Self {
        Self::new(name, true)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

#[async_trait]
impl HealthProbe for StaticProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ping(&self) -> Result<(), HealthError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(HealthError::Probe(format!("{} marked unhealthy", self.name)))
        }
    }
}
