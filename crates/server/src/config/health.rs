use std::time::Duration;

use serde::Deserialize;

use lazarus_health_postgres::PostgresProbeConfig;
use lazarus_health_redis::RedisProbeConfig;

use super::require_nonzero;
use crate::error::ConfigError;

/// Dependencies that gate replay.
///
/// A dependency is probed only when its table is present. Replay never runs
/// unless at least one is configured.
///
/// # Example
///
/// ```toml
/// [health]
/// timeout_seconds = 5
///
/// [health.postgres]
/// url = "postgres://lazarus@db.internal/ledger"
/// ssl_mode = "require"
///
/// [health.redis]
/// url = "redis://cache.internal:6379"
/// ```
#[derive(Debug, Deserialize)]
pub struct HealthConfig {
    /// Per-probe timeout in seconds.
    #[serde(default = "default_health_timeout")]
    pub timeout_seconds: u64,
    /// `PostgreSQL` dependency.
    #[serde(default)]
    pub postgres: Option<PostgresHealthConfig>,
    /// Redis dependency.
    #[serde(default)]
    pub redis: Option<RedisHealthConfig>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_health_timeout(),
            postgres: None,
            redis: None,
        }
    }
}

impl HealthConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_nonzero("health.timeout_seconds", self.timeout_seconds)?;
        if self.postgres.is_none() && self.redis.is_none() {
            return Err(ConfigError::Invalid(
                "at least one of [health.postgres] or [health.redis] must be configured".into(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Deserialize)]
pub struct PostgresHealthConfig {
    pub url: String,
    /// `PostgreSQL` SSL mode (`disable`, `prefer`, `require`, `verify-ca`,
    /// `verify-full`).
    #[serde(default)]
    pub ssl_mode: Option<String>,
}

impl PostgresHealthConfig {
    pub fn to_probe_config(&self) -> PostgresProbeConfig {
        PostgresProbeConfig {
            ssl_mode: self.ssl_mode.clone(),
            ..PostgresProbeConfig::new(&self.url)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RedisHealthConfig {
    pub url: String,
}

impl RedisHealthConfig {
    pub fn to_probe_config(&self) -> RedisProbeConfig {
        RedisProbeConfig::new(&self.url)
    }
}

fn default_health_timeout() -> u64 {
    5
}
