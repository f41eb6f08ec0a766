use thiserror::Error;

/// Errors from message broker operations.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("failed to declare queue {queue}: {reason}")]
    Declare { queue: String, reason: String },

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("acknowledgment failed: {0}")]
    Acknowledge(String),

    #[error("channel closed")]
    Closed,
}
