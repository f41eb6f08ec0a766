use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};

use lazarus_health::{HealthError, HealthProbe};

use crate::config::PostgresProbeConfig;

fn build_connect_options(config: &PostgresProbeConfig) -> Result<PgConnectOptions, HealthError> {
    let mut options: PgConnectOptions = config
        .url
        .parse()
        .map_err(|e: sqlx::Error| HealthError::Connection(e.to_string()))?;

    if let Some(ref mode) = config.ssl_mode {
        let ssl_mode = match mode.as_str() {
            "disable" => PgSslMode::Disable,
            "prefer" => PgSslMode::Prefer,
            "require" => PgSslMode::Require,
            "verify-ca" => PgSslMode::VerifyCa,
            "verify-full" => PgSslMode::VerifyFull,
            other => {
                return Err(HealthError::Connection(format!("unknown ssl_mode: {other}")));
            }
        };
        options = options.ssl_mode(ssl_mode);
    }

    Ok(options)
}

/// Database liveness probe: `SELECT 1` on a small lazily-connected pool.
pub struct PostgresProbe {
    pool: PgPool,
}

impl PostgresProbe {
    /// Build the probe. No connection is made until the first ping.
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`HealthError::Connection`] if the URL or SSL mode is invalid.
    pub fn new(config: &PostgresProbeConfig) -> Result<Self, HealthError> {
        let options = build_connect_options(config)?;
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(config.acquire_timeout)
            .connect_lazy_with(options);
        Ok(Self { pool })
    }
}

#[async_trait]
impl HealthProbe for PostgresProbe {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), HealthError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| match e {
                sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                    HealthError::Connection(e.to_string())
                }
                other => HealthError::Probe(other.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_url_is_rejected() {
        let config = PostgresProbeConfig::new("not a url");
        assert!(matches!(
            PostgresProbe::new(&config),
            Err(HealthError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn unknown_ssl_mode_is_rejected() {
        let config = PostgresProbeConfig {
            ssl_mode: Some("sometimes".into()),
            ..PostgresProbeConfig::default()
        };
        let err = PostgresProbe::new(&config).err().unwrap();
        assert!(err.to_string().contains("unknown ssl_mode"));
    }

    #[tokio::test]
    async fn construction_is_lazy() {
        let config = PostgresProbeConfig::new("postgres://nobody@127.0.0.1:1/none");
        let probe = PostgresProbe::new(&config).unwrap();
        assert_eq!(probe.name(), "postgres");
    }
}
