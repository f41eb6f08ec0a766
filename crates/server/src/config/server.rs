use std::time::Duration;

use serde::Deserialize;

use super::require_nonzero;
use crate::error::ConfigError;

/// Process lifecycle settings.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Seconds to wait for workers to finish their current message after a
    /// shutdown signal.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_seconds: default_shutdown_timeout(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_nonzero(
            "server.shutdown_timeout_seconds",
            self.shutdown_timeout_seconds,
        )
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}

fn default_shutdown_timeout() -> u64 {
    30
}
