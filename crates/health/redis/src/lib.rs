//! Redis liveness probe backed by a `deadpool-redis` pool.

mod config;
mod probe;

pub use config::RedisProbeConfig;
pub use probe::RedisProbe;
