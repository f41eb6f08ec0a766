//! `PostgreSQL` liveness probe.
//!
//! The pool connects lazily, so building the probe never touches the
//! database; the first `SELECT 1` does.

mod config;
mod probe;

pub use config::PostgresProbeConfig;
pub use probe::PostgresProbe;
