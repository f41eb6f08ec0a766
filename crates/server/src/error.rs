use thiserror::Error;

/// Errors raised while loading or validating `lazarus.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML or does not match the schema.
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The file parsed but a value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors that can occur when starting the Lazarus service.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("health probe setup failed: {0}")]
    Health(#[from] lazarus_health::HealthError),

    #[error("engine error: {0}")]
    Engine(#[from] lazarus_engine::EngineError),
}
