use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};

use lazarus_health::{HealthError, HealthProbe};

use crate::config::RedisProbeConfig;

/// Cache liveness probe: `PING` must answer `PONG`.
pub struct RedisProbe {
    pool: Pool,
}

impl RedisProbe {
    /// Build the probe. The pool connects on first use.
    ///
    /// # Errors
    ///
    /// Returns [`HealthError::Connection`] if the pool cannot be created.
    pub fn new(config: &RedisProbeConfig) -> Result<Self, HealthError> {
        let cfg = Config::from_url(&config.url);
        let pool = cfg
            .builder()
            .map(|b| {
                b.max_size(config.pool_size)
                    .wait_timeout(Some(config.connection_timeout))
                    .create_timeout(Some(config.connection_timeout))
                    .runtime(Runtime::Tokio1)
                    .build()
            })
            .map_err(|e| HealthError::Connection(e.to_string()))?
            .map_err(|e| HealthError::Connection(e.to_string()))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl HealthProbe for RedisProbe {
    fn name(&self) -> &str {
        "redis"
    }

    async fn ping(&self) -> Result<(), HealthError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| HealthError::Connection(e.to_string()))?;
        let reply: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| HealthError::Probe(e.to_string()))?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(HealthError::Probe(format!("unexpected PING reply: {reply}")))
        }
    }
}


#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use super::*;

    #[tokio::test]
    async fn ping_live_server() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let probe = RedisProbe::new(&RedisProbeConfig::new(url)).expect("pool creation should succeed");
        probe.ping().await.expect("redis should answer");
    }
}
