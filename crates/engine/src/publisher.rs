use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use lazarus_broker::{Broker, BrokerChannel, BrokerError, Confirmation, Lease};
use lazarus_core::headers::{DLQ_RETRY_COUNT, RETRY_COUNT};
use lazarus_core::{HeaderAllowlist, HeaderValue, Message};

/// Why a replay attempt did not complete.
#[derive(Debug, thiserror::Error)]
pub enum ReplayFailure {
    #[error("could not prepare publish channel: {0}")]
    Channel(#[source] BrokerError),

    #[error("publish failed: {0}")]
    Publish(#[source] BrokerError),

    #[error("broker refused the message")]
    Nacked,

    #[error("channel closed before confirmation")]
    ConfirmChannelClosed,

    #[error("no confirmation within {0:?}")]
    ConfirmTimeout(Duration),
}

/// Republishes dead-lettered messages to their origin queue.
///
/// Every replay uses its own channel in confirm mode so a slow or failed
/// confirmation cannot disturb the consuming channel or another replay.
#[derive(Clone)]
pub struct ReplayPublisher {
    broker: Arc<dyn Broker>,
    allowlist: Arc<HeaderAllowlist>,
    confirm_timeout: Duration,
}

impl ReplayPublisher {
    pub fn new(
        broker: Arc<dyn Broker>,
        allowlist: Arc<HeaderAllowlist>,
        confirm_timeout: Duration,
    ) -> Self {
        Self {
            broker,
            allowlist,
            confirm_timeout,
        }
    }

    /// Build the outgoing message: allowlisted headers only, the dead-letter
    /// retry count bumped in place, and the primary consumer's retry counter
    /// removed. Body and content type are untouched.
    pub fn sanitize(&self, source: &Message) -> Message {
        let mut headers = self.allowlist.filter(&source.headers);

        let (next, saturated) = match source.headers.get(DLQ_RETRY_COUNT) {
            Some(current) => current.incremented(),
            None => (HeaderValue::Int32(1), false),
        };
        if saturated {
            warn!(retry_count = ?next, "retry count overflowed, holding at maximum");
        }
        headers.insert(DLQ_RETRY_COUNT, next);
        headers.remove(RETRY_COUNT);

        Message {
            body: source.body.clone(),
            content_type: source.content_type.clone(),
            headers,
            persistent: true,
        }
    }

    /// Publish `lease`'s message to `destination` and settle the lease.
    ///
    /// The lease is accepted only after the broker confirms the copy; any
    /// other outcome requeues it. The publish channel is closed on every path.
    ///
    /// # Errors
    ///
    /// Returns the [`ReplayFailure`] that caused the lease to be requeued.
    pub async fn replay(&self, lease: Lease, destination: &str) -> Result<(), ReplayFailure> {
        let outgoing = self.sanitize(lease.message());

        let result = match self.broker.open_channel().await {
            Ok(channel) => {
                let result = self.publish_confirmed(channel.as_ref(), destination, &outgoing).await;
                if let Err(e) = channel.close().await {
                    debug!(error = %e, "publish channel close failed");
                }
                result
            }
            Err(e) => Err(ReplayFailure::Channel(e)),
        };

        match result {
            Ok(()) => {
                if let Err(e) = lease.accept().await {
                    // The copy is already on the destination; the original will
                    // be redelivered and replayed again.
                    warn!(error = %e, destination, "replayed but failed to remove original");
                }
                Ok(())
            }
            Err(failure) => {
                if let Err(e) = lease.requeue().await {
                    warn!(error = %e, "failed to requeue after unsuccessful replay");
                }
                Err(failure)
            }
        }
    }

    async fn publish_confirmed(
        &self,
        channel: &dyn BrokerChannel,
        destination: &str,
        message: &Message,
    ) -> Result<(), ReplayFailure> {
        channel
            .enable_confirms()
            .await
            .map_err(ReplayFailure::Channel)?;
        let pending = channel
            .publish(destination, message)
            .await
            .map_err(ReplayFailure::Publish)?;

        match tokio::time::timeout(self.confirm_timeout, pending).await {
            Ok(Confirmation::Ack) => Ok(()),
            Ok(Confirmation::Nack) => Err(ReplayFailure::Nacked),
            Ok(Confirmation::Closed) => Err(ReplayFailure::ConfirmChannelClosed),
            Err(_) => Err(ReplayFailure::ConfirmTimeout(self.confirm_timeout)),
        }
    }
}

impl std::fmt::Debug for ReplayPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayPublisher")
            .field("allowlist", &self.allowlist)
            .field("confirm_timeout", &self.confirm_timeout)
            .finish_non_exhaustive()
    }
}
