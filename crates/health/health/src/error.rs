use std::time::Duration;

use thiserror::Error;

/// Errors reported by a [`HealthProbe`](crate::HealthProbe).
#[derive(Debug, Error)]
pub enum HealthError {
    /// The dependency could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// The dependency answered, but not with the expected reply.
    #[error("probe failed: {0}")]
    Probe(String),

    /// The probe did not complete in time.
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
}
