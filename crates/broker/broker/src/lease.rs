use async_trait::async_trait;
use tracing::warn;

use lazarus_core::{Headers, Message};

use crate::error::BrokerError;

/// Backend hook that settles a single delivery.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    /// Accept the delivery and remove it from the queue.
    async fn ack(&self) -> Result<(), BrokerError>;

    /// Reject the delivery, optionally returning it to the queue.
    async fn reject(&self, requeue: bool) -> Result<(), BrokerError>;
}

/// Exclusive hold on a delivered message.
///
/// A lease is settled by exactly one of [`accept`](Self::accept) or
/// [`requeue`](Self::requeue). Both consume the lease, so a second
/// resolution does not compile. A lease dropped without being settled is
/// logged; the broker returns it to the queue when the channel closes.
pub struct Lease {
    queue: String,
    delivery_tag: u64,
    message: Message,
    acker: Option<Box<dyn Acknowledger>>,
}

impl Lease {
    pub fn new(
        queue: impl Into<String>,
        delivery_tag: u64,
        message: Message,
        acker: Box<dyn Acknowledger>,
    ) -> Self {
        Self {
            queue: queue.into(),
            delivery_tag,
            message,
            acker: Some(acker),
        }
    }

    /// The queue the message was fetched from.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn delivery_tag(&self) -> u64 {
        self.delivery_tag
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn headers(&self) -> &Headers {
        &self.message.headers
    }

    /// Accept the message and remove it from the queue.
    pub async fn accept(mut self) -> Result<(), BrokerError> {
        match self.acker.take() {
            Some(acker) => acker.ack().await,
            None => Err(BrokerError::Acknowledge("lease already settled".into())),
        }
    }

    /// Reject the message and put it back on the queue.
    pub async fn requeue(mut self) -> Result<(), BrokerError> {
        match self.acker.take() {
            Some(acker) => acker.reject(true).await,
            None => Err(BrokerError::Acknowledge("lease already settled".into())),
        }
    }
}

impl std::fmt::Debug for Lease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("queue", &self.queue)
            .field("delivery_tag", &self.delivery_tag)
            .field("settled", &self.acker.is_none())
            .finish_non_exhaustive()
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if self.acker.is_some() {
            warn!(
                queue = %self.queue,
                delivery_tag = self.delivery_tag,
                "lease dropped without acknowledgment, broker will redeliver"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<&'static str>>,
    }

    struct RecordingAcker(Arc<Recorder>);

    #[async_trait]
    impl Acknowledger for RecordingAcker {
        async fn ack(&self) -> Result<(), BrokerError> {
            self.0.calls.lock().unwrap().push("ack");
            Ok(())
        }

        async fn reject(&self, requeue: bool) -> Result<(), BrokerError> {
            self.0
                .calls
                .lock()
                .unwrap()
                .push(if requeue { "requeue" } else { "drop" });
            Ok(())
        }
    }

    fn lease(recorder: &Arc<Recorder>) -> Lease {
        Lease::new(
            "payments.dlq",
            7,
            Message::new(b"{}".to_vec()),
            Box::new(RecordingAcker(Arc::clone(recorder))),
        )
    }

    #[tokio::test]
    async fn accept_acks_once() {
        let recorder = Arc::new(Recorder::default());
        let l = lease(&recorder);
        assert_eq!(l.queue(), "payments.dlq");
        assert_eq!(l.delivery_tag(), 7);
        l.accept().await.unwrap();
        assert_eq!(*recorder.calls.lock().unwrap(), vec!["ack"]);
    }

    #[tokio::test]
    async fn requeue_rejects_with_requeue() {
        let recorder = Arc::new(Recorder::default());
        lease(&recorder).requeue().await.unwrap();
        assert_eq!(*recorder.calls.lock().unwrap(), vec!["requeue"]);
    }

    #[test]
    fn debug_reports_settlement() {
        let recorder = Arc::new(Recorder::default());
        let l = lease(&recorder);
        let rendered = format!("{l:?}");
        assert!(rendered.contains("settled: false"));
    }
}
