pub mod config;
pub mod error;
pub mod factory;
pub mod telemetry;
