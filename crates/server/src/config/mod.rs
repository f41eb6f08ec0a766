mod broker;
mod health;
mod replay;
mod server;
mod telemetry;


pub use broker::*;
pub use health::*;
pub use replay::*;
pub use server::*;
pub use telemetry::*;

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Top-level configuration for the Lazarus service, loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct LazarusConfig {
    /// AMQP broker connection.
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Queues to drain and replay tunables.
    #[serde(default)]
    pub replay: ReplayConfig,
    /// Dependencies that must be healthy before replaying.
    #[serde(default)]
    pub health: HealthConfig,
    /// Process lifecycle settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// OpenTelemetry distributed tracing configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl LazarusConfig {
    /// Parse a configuration document.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Load `path`, falling back to defaults when the file does not exist.
    ///
    /// The returned flag is `false` when defaults were used.
    pub fn load(path: impl AsRef<Path>) -> Result<(Self, bool), ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok((Self::default(), false));
        }
        let contents = std::fs::read_to_string(path)?;
        Ok((Self::parse(&contents)?, true))
    }

    /// Check the values the engine cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.broker.validate()?;
        self.replay.validate()?;
        self.health.validate()?;
        self.server.validate()?;
        self.telemetry.validate()
    }
}

/// Reject a zero-valued setting.
pub(crate) fn require_nonzero(name: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
    }
    Ok(())
}
