use std::time::Duration;

use serde::Deserialize;

use lazarus_core::{HeaderAllowlist, QueueRegistry};
use lazarus_engine::EngineConfig;

use super::require_nonzero;
use crate::error::ConfigError;

/// Which queues to drain and how.
///
/// Each entry in `queues` names an original queue; its dead-letter queue is
/// the same name with a `.dlq` suffix.
///
/// # Example
///
/// ```toml
/// [replay]
/// queues = ["payments", "balances"]
/// poll_interval_seconds = 10
/// max_retries = 10
/// extra_allowed_headers = ["x-tenant-id"]
/// ```
#[derive(Debug, Deserialize)]
pub struct ReplayConfig {
    /// Original queue names. Only these may be replay targets.
    #[serde(default)]
    pub queues: Vec<String>,
    /// Seconds between supervisory ticks.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Maximum messages handled per queue per tick.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Unacknowledged deliveries allowed per consuming channel.
    #[serde(default = "default_prefetch")]
    pub prefetch: u16,
    /// Seconds to wait for a publisher confirmation.
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_seconds: u64,
    /// Retry count at which a message is discarded.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Seconds to wait before restarting a crashed worker.
    #[serde(default = "default_worker_restart_delay")]
    pub worker_restart_delay_seconds: u64,
    /// Headers forwarded on replay in addition to the built-in allowlist.
    #[serde(default)]
    pub extra_allowed_headers: Vec<String>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            queues: Vec::new(),
            poll_interval_seconds: default_poll_interval(),
            batch_size: default_batch_size(),
            prefetch: default_prefetch(),
            confirm_timeout_seconds: default_confirm_timeout(),
            max_retries: default_max_retries(),
            worker_restart_delay_seconds: default_worker_restart_delay(),
            extra_allowed_headers: Vec::new(),
        }
    }
}

impl ReplayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queues.is_empty() {
            return Err(ConfigError::Invalid(
                "replay.queues must name at least one queue".into(),
            ));
        }
        require_nonzero("replay.poll_interval_seconds", self.poll_interval_seconds)?;
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "replay.batch_size must be greater than zero".into(),
            ));
        }
        require_nonzero("replay.prefetch", u64::from(self.prefetch))?;
        require_nonzero(
            "replay.confirm_timeout_seconds",
            self.confirm_timeout_seconds,
        )?;
        require_nonzero("replay.max_retries", u64::from(self.max_retries))?;
        // Queue names and header keys get their own checks when built.
        self.registry()?;
        self.allowlist()?;
        Ok(())
    }

    /// Build the registry of valid replay targets.
    pub fn registry(&self) -> Result<QueueRegistry, ConfigError> {
        QueueRegistry::new(&self.queues).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Build the header allowlist.
    pub fn allowlist(&self) -> Result<HeaderAllowlist, ConfigError> {
        HeaderAllowlist::with_extra(&self.extra_allowed_headers)
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            poll_interval: Duration::from_secs(self.poll_interval_seconds),
            batch_size: self.batch_size,
            prefetch: self.prefetch,
            confirm_timeout: Duration::from_secs(self.confirm_timeout_seconds),
            max_retries: i64::from(self.max_retries),
            worker_restart_delay: Duration::from_secs(self.worker_restart_delay_seconds),
        }
    }
}

fn default_poll_interval() -> u64 {
    10
}

fn default_batch_size() -> usize {
    10
}

fn default_prefetch() -> u16 {
    10
}

fn default_confirm_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    10
}

fn default_worker_restart_delay() -> u64 {
    1
}
