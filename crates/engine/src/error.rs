use thiserror::Error;

use lazarus_broker::BrokerError;
use lazarus_core::CoreError;

/// Errors raised while assembling or running the replay engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A broker operation failed.
    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    /// A core value (registry, allowlist) could not be built.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Preparing a queue for consumption failed.
    #[error("setup failed for {queue}: {source}")]
    Setup {
        queue: String,
        #[source]
        source: BrokerError,
    },

    /// The engine was misconfigured (e.g. missing required components).
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// A message whose replay target failed the security check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The resolved target is not a monitored queue.
    #[error("replay target {0:?} is not a registered queue")]
    UnregisteredTarget(String),

    /// No target header and the dead-letter queue has no known origin.
    #[error("dead-letter queue {0:?} has no registered origin")]
    UnknownOrigin(String),
}
