use async_trait::async_trait;
use futures::future::BoxFuture;

use lazarus_core::Message;

use crate::error::BrokerError;
use crate::lease::Lease;

/// The broker's verdict on a published message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// The broker took responsibility for the message.
    Ack,
    /// The broker refused the message.
    Nack,
    /// The channel closed before a verdict arrived.
    Closed,
}

/// A publisher confirmation that has not resolved yet.
///
/// The future may never complete if the broker stalls; callers bound it with
/// [`tokio::time::timeout`].
pub type PendingConfirm = BoxFuture<'static, Confirmation>;

/// Entry point to a broker connection.
///
/// Channels are cheap, independent, and never shared between tasks: each
/// per-queue worker owns one for consumption and each replay opens its own for
/// publishing.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Open a new channel on the underlying connection.
    async fn open_channel(&self) -> Result<Box<dyn BrokerChannel>, BrokerError>;

    /// Release the underlying connection. Backends without one do nothing.
    async fn close(&self) {}
}

/// A single broker channel.
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    /// Declare a durable queue. Succeeds if the queue already exists.
    async fn declare_queue(&self, queue: &str) -> Result<(), BrokerError>;

    /// Limit the number of unacknowledged deliveries on this channel.
    async fn set_prefetch(&self, count: u16) -> Result<(), BrokerError>;

    /// Fetch the next available message from `queue` without waiting.
    ///
    /// Returns `Ok(None)` when the queue has nothing ready.
    async fn get(&self, queue: &str) -> Result<Option<Lease>, BrokerError>;

    /// Put the channel into publisher-confirm mode.
    async fn enable_confirms(&self) -> Result<(), BrokerError>;

    /// Publish `message` to `queue` through the default exchange.
    ///
    /// The returned future resolves once the broker confirms or refuses the
    /// message. Without [`enable_confirms`](Self::enable_confirms) it resolves
    /// to [`Confirmation::Ack`] immediately.
    async fn publish(&self, queue: &str, message: &Message) -> Result<PendingConfirm, BrokerError>;

    /// Close the channel. Unresolved leases obtained from it are returned to
    /// their queues by the broker.
    async fn close(&self) -> Result<(), BrokerError>;

    /// Whether the channel is still usable.
    fn is_open(&self) -> bool;
}
