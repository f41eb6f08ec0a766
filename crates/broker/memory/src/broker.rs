use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};

use lazarus_broker::{Broker, BrokerChannel, BrokerError};
use lazarus_core::Message;

use crate::channel::MemoryChannel;

/// How the in-memory broker answers a confirmed publish to a given queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfirmBehavior {
    /// Enqueue the message and confirm it.
    #[default]
    Ack,
    /// Refuse the message.
    Nack,
    /// Report the channel closed before confirming.
    Close,
    /// Never answer.
    Hang,
}

/// State of a single in-memory queue.
#[derive(Debug, Default)]
pub(crate) struct QueueState {
    pub(crate) durable: bool,
    pub(crate) ready: VecDeque<Message>,
    /// Delivery tag -> (owning channel id, message).
    pub(crate) unacked: HashMap<u64, (u64, Message)>,
    /// Every message accepted by a confirmed publish, in order.
    pub(crate) published: Vec<Message>,
}

#[derive(Debug, Default)]
pub(crate) struct Inner {
    pub(crate) queues: DashMap<String, QueueState>,
    pub(crate) next_tag: AtomicU64,
    pub(crate) next_channel: AtomicU64,
    pub(crate) open_channels: AtomicU64,
    pub(crate) confirm: DashMap<String, ConfirmBehavior>,
    pub(crate) failing_declares: DashSet<String>,
    pub(crate) failing_gets: DashSet<String>,
    pub(crate) failing_opens: AtomicU32,
    /// Prefetch limit per open channel id.
    pub(crate) prefetch: DashMap<u64, u16>,
}

impl Inner {
    pub(crate) fn next_tag(&self) -> u64 {
        self.next_tag.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Return every unsettled delivery owned by `channel` to the head of its
    /// queue, preserving delivery order.
    pub(crate) fn release_channel(&self, channel: u64) {
        for mut queue in self.queues.iter_mut() {
            let mut tags: Vec<u64> = queue
                .unacked
                .iter()
                .filter(|(_, (owner, _))| *owner == channel)
                .map(|(tag, _)| *tag)
                .collect();
            tags.sort_unstable();
            for tag in tags.into_iter().rev() {
                if let Some((_, message)) = queue.unacked.remove(&tag) {
                    queue.ready.push_front(message);
                }
            }
        }
    }
}

/// An in-process [`Broker`] with AMQP-like queue semantics.
///
/// Queues are FIFO; a requeued delivery goes back to the head of its queue,
/// and closing a channel returns its unsettled deliveries. Publishing to an
/// undeclared queue creates it. Faults can be injected per queue to exercise
/// error paths without a real broker.
///
/// # Examples
///
/// ```
/// use lazarus_broker_memory::MemoryBroker;
/// use lazarus_core::Message;
///
/// let broker = MemoryBroker::new();
/// broker.push("payments.dlq", Message::new(b"{}".to_vec()));
/// assert_eq!(broker.depth("payments.dlq"), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a message directly, as a producer outside the engine would.
    pub fn push(&self, queue: &str, message: Message) {
        self.inner
            .queues
            .entry(queue.to_owned())
            .or_default()
            .ready
            .push_back(message);
    }

    /// Number of messages ready for delivery.
    pub fn depth(&self, queue: &str) -> usize {
        self.inner.queues.get(queue).map_or(0, |q| q.ready.len())
    }

    /// Number of delivered messages awaiting acknowledgment.
    pub fn unacked(&self, queue: &str) -> usize {
        self.inner.queues.get(queue).map_or(0, |q| q.unacked.len())
    }

    /// Messages accepted by confirmed publishes to `queue`.
    pub fn published(&self, queue: &str) -> Vec<Message> {
        self.inner
            .queues
            .get(queue)
            .map(|q| q.published.clone())
            .unwrap_or_default()
    }

    /// Snapshot of the messages currently ready in `queue`, head first.
    pub fn ready(&self, queue: &str) -> Vec<Message> {
        self.inner
            .queues
            .get(queue)
            .map(|q| q.ready.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether `queue` was declared durable through a channel.
    pub fn is_declared(&self, queue: &str) -> bool {
        self.inner.queues.get(queue).is_some_and(|q| q.durable)
    }

    /// Number of channels currently open.
    pub fn open_channels(&self) -> u64 {
        self.inner.open_channels.load(Ordering::SeqCst)
    }

    /// Prefetch limits of the open channels that set one, in channel order.
    pub fn channel_prefetches(&self) -> Vec<u16> {
        let mut limits: Vec<(u64, u16)> = self
            .inner
            .prefetch
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        limits.sort_unstable();
        limits.into_iter().map(|(_, count)| count).collect()
    }

    /// Control how confirmed publishes to `queue` are answered.
    pub fn set_confirm_behavior(&self, queue: &str, behavior: ConfirmBehavior) {
        self.inner.confirm.insert(queue.to_owned(), behavior);
    }

    /// Make the next `count` channel opens fail.
    pub fn fail_next_opens(&self, count: u32) {
        self.inner.failing_opens.store(count, Ordering::SeqCst);
    }

    /// Make declarations of `queue` fail until [`heal`](Self::heal) is called.
    pub fn fail_declare(&self, queue: &str) {
        self.inner.failing_declares.insert(queue.to_owned());
    }

    /// Make polls of `queue` fail with a channel error until healed.
    pub fn fail_get(&self, queue: &str) {
        self.inner.failing_gets.insert(queue.to_owned());
    }

    /// Clear every injected fault.
    pub fn heal(&self) {
        self.inner.failing_declares.clear();
        self.inner.failing_gets.clear();
        self.inner.failing_opens.store(0, Ordering::SeqCst);
        self.inner.confirm.clear();
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn open_channel(&self) -> Result<Box<dyn BrokerChannel>, BrokerError> {
        let failing = self
            .inner
            .failing_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(BrokerError::Connection("injected channel open failure".into()));
        }

        let id = self.inner.next_channel.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner.open_channels.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryChannel::new(Arc::clone(&self.inner), id)))
    }
}
