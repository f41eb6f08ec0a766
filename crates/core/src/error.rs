use thiserror::Error;

/// Errors raised while building the immutable replay configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("queue registry is empty")]
    EmptyRegistry,

    #[error("invalid queue name {0:?}: must be non-empty")]
    EmptyQueueName(String),

    #[error("invalid queue name {0:?}: monitored queues must not carry the dead-letter suffix")]
    DeadLetterName(String),

    #[error("invalid header name {0:?}")]
    InvalidHeader(String),
}
