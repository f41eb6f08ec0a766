use std::time::Duration;

/// Tunables for the replay engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Time between supervisory ticks (default: 10 seconds).
    pub poll_interval: Duration,
    /// Maximum messages handled per queue per tick (default: 10).
    pub batch_size: usize,
    /// Unacknowledged deliveries allowed on a consuming channel (default: 10).
    pub prefetch: u16,
    /// How long to wait for a publisher confirmation (default: 10 seconds).
    pub confirm_timeout: Duration,
    /// Retry count at which a message is discarded instead of replayed
    /// (default: 10).
    pub max_retries: i64,
    /// Pause before restarting a worker that exited unexpectedly
    /// (default: 1 second).
    pub worker_restart_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            batch_size: 10,
            prefetch: 10,
            confirm_timeout: Duration::from_secs(10),
            max_retries: 10,
            worker_restart_delay: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.poll_interval, Duration::from_secs(10));
        assert_eq!(cfg.batch_size, 10);
        assert_eq!(cfg.prefetch, 10);
        assert_eq!(cfg.confirm_timeout, Duration::from_secs(10));
        assert_eq!(cfg.max_retries, 10);
        assert_eq!(cfg.worker_restart_delay, Duration::from_secs(1));
    }
}
