use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::FutureExt;

use lazarus_broker::{
    Acknowledger, BrokerChannel, BrokerError, Confirmation, Lease, PendingConfirm,
};
use lazarus_core::Message;

use crate::broker::{ConfirmBehavior, Inner};

/// A channel on a [`MemoryBroker`](crate::MemoryBroker).
pub struct MemoryChannel {
    inner: Arc<Inner>,
    id: u64,
    open: AtomicBool,
    confirms: AtomicBool,
}

impl MemoryChannel {
    pub(crate) fn new(inner: Arc<Inner>, id: u64) -> Self {
        Self {
            inner,
            id,
            open: AtomicBool::new(true),
            confirms: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), BrokerError> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BrokerError::Closed)
        }
    }

    fn shut(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            self.inner.release_channel(self.id);
            self.inner.prefetch.remove(&self.id);
            self.inner.open_channels.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl BrokerChannel for MemoryChannel {
    async fn declare_queue(&self, queue: &str) -> Result<(), BrokerError> {
        self.ensure_open()?;
        if self.inner.failing_declares.contains(queue) {
            return Err(BrokerError::Declare {
                queue: queue.to_owned(),
                reason: "injected declare failure".into(),
            });
        }
        self.inner
            .queues
            .entry(queue.to_owned())
            .or_default()
            .durable = true;
        Ok(())
    }

    async fn set_prefetch(&self, count: u16) -> Result<(), BrokerError> {
        self.ensure_open()?;
        self.inner.prefetch.insert(self.id, count);
        Ok(())
    }

    async fn get(&self, queue: &str) -> Result<Option<Lease>, BrokerError> {
        self.ensure_open()?;
        if self.inner.failing_gets.contains(queue) {
            return Err(BrokerError::Channel(format!("injected get failure on {queue}")));
        }

        let Some(mut state) = self.inner.queues.get_mut(queue) else {
            return Ok(None);
        };
        let Some(message) = state.ready.pop_front() else {
            return Ok(None);
        };
        let tag = self.inner.next_tag();
        state.unacked.insert(tag, (self.id, message.clone()));
        drop(state);

        let acker = MemoryAcker {
            inner: Arc::clone(&self.inner),
            queue: queue.to_owned(),
            tag,
        };
        Ok(Some(Lease::new(queue, tag, message, Box::new(acker))))
    }

    async fn enable_confirms(&self) -> Result<(), BrokerError> {
        self.ensure_open()?;
        self.confirms.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn publish(&self, queue: &str, message: &Message) -> Result<PendingConfirm, BrokerError> {
        self.ensure_open()?;

        if !self.confirms.load(Ordering::SeqCst) {
            deliver(&self.inner, queue, message);
            return Ok(futures::future::ready(Confirmation::Ack).boxed());
        }

        let behavior = self
            .inner
            .confirm
            .get(queue)
            .map(|b| *b)
            .unwrap_or_default();

        let pending = match behavior {
            ConfirmBehavior::Ack => {
                deliver(&self.inner, queue, message);
                futures::future::ready(Confirmation::Ack).boxed()
            }
            ConfirmBehavior::Nack => futures::future::ready(Confirmation::Nack).boxed(),
            ConfirmBehavior::Close => {
                self.shut();
                futures::future::ready(Confirmation::Closed).boxed()
            }
            ConfirmBehavior::Hang => futures::future::pending().boxed(),
        };
        Ok(pending)
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.shut();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl Drop for MemoryChannel {
    fn drop(&mut self) {
        self.shut();
    }
}

fn deliver(inner: &Inner, queue: &str, message: &Message) {
    let mut state = inner.queues.entry(queue.to_owned()).or_default();
    state.ready.push_back(message.clone());
    state.published.push(message.clone());
}

struct MemoryAcker {
    inner: Arc<Inner>,
    queue: String,
    tag: u64,
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        let mut state = self.inner.queues.get_mut(&self.queue).ok_or(BrokerError::Closed)?;
        state
            .unacked
            .remove(&self.tag)
            .map(|_| ())
            .ok_or(BrokerError::Closed)
    }

    async fn reject(&self, requeue: bool) -> Result<(), BrokerError> {
        let mut state = self.inner.queues.get_mut(&self.queue).ok_or(BrokerError::Closed)?;
        let (_, message) = state.unacked.remove(&self.tag).ok_or(BrokerError::Closed)?;
        if requeue {
            state.ready.push_front(message);
        }
        Ok(())
    }
}
