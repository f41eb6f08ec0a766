//! Infrastructure health gate.
//!
//! Replay only makes sense while the systems downstream of the original
//! queues are up. Each dependency is wrapped in a [`HealthProbe`]; the
//! [`HealthGate`] pings every configured probe concurrently under a timeout
//! and reports a [`HealthSnapshot`].

pub mod error;
pub mod gate;
pub mod probe;

pub use error::HealthError;
pub use gate::{HealthGate, HealthSnapshot, ProbeStatus};
pub use probe::{HealthProbe, StaticProbe};
