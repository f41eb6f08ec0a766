use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};

use lazarus_broker::{Broker, BrokerChannel, BrokerError, Lease};

use crate::metrics::ReplayMetrics;
use crate::policy::{Decision, ReplayPolicy};
use crate::publisher::ReplayPublisher;
use crate::validator::ReplayValidator;

/// Terminal decision reached for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Republished and removed from the dead-letter queue.
    Replayed,
    /// Requeued because its backoff has not elapsed.
    Deferred,
    /// Dropped because its replay target failed validation.
    Rejected,
    /// Dropped because its retry budget was spent.
    PermanentlyLost,
    /// Requeued because publishing or confirmation failed.
    Failed,
}

impl Disposition {
    /// Whether the message went back to the head of its queue.
    pub fn requeued(self) -> bool {
        matches!(self, Self::Deferred | Self::Failed)
    }
}

/// Why a pass over a queue stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PassEnd {
    /// No message was immediately available.
    #[default]
    Drained,
    /// The batch cap was reached.
    BatchLimit,
    /// A message was requeued; it is back at the head of the queue.
    Requeued,
    /// Shutdown was requested.
    Cancelled,
    /// The channel could not be opened or prepared.
    SetupFailed,
    /// The channel failed mid-pass.
    ChannelLost,
}

/// Counts for one pass over one dead-letter queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub queue: String,
    pub replayed: usize,
    pub deferred: usize,
    pub rejected: usize,
    pub lost: usize,
    pub failed: usize,
    pub end: PassEnd,
}

impl PassSummary {
    fn new(queue: &str) -> Self {
        Self {
            queue: queue.to_owned(),
            ..Self::default()
        }
    }

    /// Messages that reached a terminal decision during the pass.
    pub fn processed(&self) -> usize {
        self.replayed + self.deferred + self.rejected + self.lost + self.failed
    }

    fn record(&mut self, disposition: Disposition) {
        match disposition {
            Disposition::Replayed => self.replayed += 1,
            Disposition::Deferred => self.deferred += 1,
            Disposition::Rejected => self.rejected += 1,
            Disposition::PermanentlyLost => self.lost += 1,
            Disposition::Failed => self.failed += 1,
        }
    }
}

/// Everything a processor needs that is shared across queues.
#[derive(Clone)]
pub struct ReplayContext {
    pub broker: Arc<dyn Broker>,
    pub validator: ReplayValidator,
    pub policy: ReplayPolicy,
    pub publisher: ReplayPublisher,
    pub metrics: Arc<ReplayMetrics>,
    pub batch_size: usize,
    pub prefetch: u16,
}

impl std::fmt::Debug for ReplayContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayContext")
            .field("validator", &self.validator)
            .field("policy", &self.policy)
            .field("publisher", &self.publisher)
            .field("batch_size", &self.batch_size)
            .field("prefetch", &self.prefetch)
            .finish_non_exhaustive()
    }
}

/// Drains one dead-letter queue, one message at a time.
///
/// The consuming channel is owned here and reused across passes. It is
/// dropped after any channel-level failure and reopened (with the queue
/// declaration and prefetch reapplied) on the next pass.
pub struct QueueProcessor {
    dlq: String,
    context: Arc<ReplayContext>,
    channel: Option<Box<dyn BrokerChannel>>,
}

impl QueueProcessor {
    pub fn new(dlq: impl Into<String>, context: Arc<ReplayContext>) -> Self {
        Self {
            dlq: dlq.into(),
            context,
            channel: None,
        }
    }

    pub fn queue(&self) -> &str {
        &self.dlq
    }

    /// Run one pass: poll until the batch cap, an empty queue, a requeue, or
    /// cancellation. Cancellation is only observed between messages.
    #[instrument(skip(self, cancel), fields(dlq.queue = %self.dlq))]
    pub async fn process_pass(&mut self, cancel: &CancellationToken) -> PassSummary {
        let mut summary = PassSummary::new(&self.dlq);

        if let Err(e) = self.ensure_channel().await {
            self.context.metrics.increment_setup_failures();
            warn!(error = %e, "queue setup failed, skipping this tick");
            self.channel = None;
            summary.end = PassEnd::SetupFailed;
            return summary;
        }

        summary.end = loop {
            if cancel.is_cancelled() {
                break PassEnd::Cancelled;
            }
            if summary.processed() >= self.context.batch_size {
                break PassEnd::BatchLimit;
            }
            let Some(channel) = self.channel.as_deref() else {
                break PassEnd::ChannelLost;
            };

            let lease = match channel.get(&self.dlq).await {
                Ok(Some(lease)) => lease,
                Ok(None) => break PassEnd::Drained,
                Err(e) => {
                    warn!(error = %e, "poll failed, dropping channel");
                    self.channel = None;
                    break PassEnd::ChannelLost;
                }
            };

            let disposition = self.handle(lease).await;
            summary.record(disposition);

            if !self.channel.as_deref().is_some_and(|c| c.is_open()) {
                warn!("channel closed during pass, dropping it");
                self.channel = None;
                break PassEnd::ChannelLost;
            }
            if disposition.requeued() {
                break PassEnd::Requeued;
            }
        };

        if summary.processed() > 0 {
            info!(
                replayed = summary.replayed,
                deferred = summary.deferred,
                rejected = summary.rejected,
                lost = summary.lost,
                failed = summary.failed,
                end = ?summary.end,
                "pass complete"
            );
        } else {
            debug!(end = ?summary.end, "pass complete");
        }
        summary
    }

    /// Close the consuming channel, returning any unsettled deliveries.
    pub async fn shutdown(&mut self) {
        if let Some(channel) = self.channel.take()
            && let Err(e) = channel.close().await
        {
            debug!(queue = %self.dlq, error = %e, "channel close failed");
        }
    }

    async fn ensure_channel(&mut self) -> Result<(), BrokerError> {
        if self.channel.as_deref().is_some_and(|c| c.is_open()) {
            return Ok(());
        }
        self.channel = None;

        let channel = self.context.broker.open_channel().await?;
        channel.declare_queue(&self.dlq).await?;
        channel.set_prefetch(self.context.prefetch).await?;
        self.channel = Some(channel);
        Ok(())
    }

    async fn handle(&self, lease: Lease) -> Disposition {
        let ctx = &self.context;
        let retry_count = lease.headers().dlq_retry_count();

        let resolved = ctx
            .validator
            .resolve(&self.dlq, lease.headers())
            .map(str::to_owned);
        let destination = match resolved {
            Ok(target) => target,
            Err(e) => {
                error!(
                    security_event = "dlq_replay_target_rejected",
                    queue = %self.dlq,
                    claimed_target = lease.headers().dlq_original_queue().unwrap_or_default(),
                    reason = %e,
                    "replay target rejected, dropping message"
                );
                ctx.metrics.increment_security_rejected();
                settle(lease.accept().await);
                return Disposition::Rejected;
            }
        };

        match ctx.policy.decide(lease.headers()) {
            Decision::Exhausted { retry_count } => {
                error!(
                    alert = "dlq_permanent_message_loss",
                    queue = %self.dlq,
                    destination = %destination,
                    retry_count,
                    max_retries = ctx.policy.max_retries(),
                    reason = lease.headers().dlq_reason().unwrap_or_default(),
                    "retry budget exhausted, discarding message"
                );
                ctx.metrics.increment_permanently_lost();
                settle(lease.accept().await);
                Disposition::PermanentlyLost
            }
            Decision::Defer { remaining, .. } => {
                debug!(retry_count, ?remaining, "backoff not elapsed, requeueing");
                ctx.metrics.increment_deferred();
                settle(lease.requeue().await);
                Disposition::Deferred
            }
            Decision::Replay { eligibility, .. } => {
                let span = info_span!(
                    "dlq.replay",
                    dlq.destination = %destination,
                    dlq.retry_count = retry_count,
                );
                match ctx
                    .publisher
                    .replay(lease, &destination)
                    .instrument(span)
                    .await
                {
                    Ok(()) => {
                        info!(
                            destination = %destination,
                            retry_count,
                            ?eligibility,
                            outcome = "replayed",
                            "message replayed"
                        );
                        ctx.metrics.increment_replayed();
                        Disposition::Replayed
                    }
                    Err(e) => {
                        warn!(
                            destination = %destination,
                            retry_count,
                            error = %e,
                            outcome = "requeued",
                            "replay failed, message requeued"
                        );
                        ctx.metrics.increment_replay_failed();
                        Disposition::Failed
                    }
                }
            }
        }
    }
}

fn settle(result: Result<(), BrokerError>) {
    if let Err(e) = result {
        warn!(error = %e, "failed to settle message, broker will redeliver");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use lazarus_broker_memory::{ConfirmBehavior, MemoryBroker};
    use lazarus_core::headers::{DLQ_ORIGINAL_QUEUE, DLQ_RETRY_COUNT, DLQ_TIMESTAMP};
    use lazarus_core::{HeaderAllowlist, Headers, ManualClock, Message, QueueRegistry};

    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn context(broker: &MemoryBroker, batch_size: usize) -> Arc<ReplayContext> {
        let registry = Arc::new(QueueRegistry::new(["payments", "balances"]).unwrap());
        let broker: Arc<dyn Broker> = Arc::new(broker.clone());
        Arc::new(ReplayContext {
            broker: Arc::clone(&broker),
            validator: ReplayValidator::new(registry),
            policy: ReplayPolicy::new(10, Arc::new(ManualClock::new(NOW))),
            publisher: ReplayPublisher::new(
                broker,
                Arc::new(HeaderAllowlist::default()),
                Duration::from_secs(10),
            ),
            metrics: Arc::new(ReplayMetrics::default()),
            batch_size,
            prefetch: 7,
        })
    }

    fn message(retry: i32, target: &str) -> Message {
        Message::new(format!("retry-{retry}").into_bytes()).with_headers(
            Headers::new()
                .with(DLQ_RETRY_COUNT, retry)
                .with(DLQ_ORIGINAL_QUEUE, target),
        )
    }

    #[tokio::test]
    async fn drains_and_replays() {
        let broker = MemoryBroker::new();
        broker.push("payments.dlq", message(0, "payments"));
        broker.push("payments.dlq", message(0, "payments"));
        let ctx = context(&broker, 10);
        let mut p = QueueProcessor::new("payments.dlq", Arc::clone(&ctx));

        let summary = p.process_pass(&CancellationToken::new()).await;
        assert_eq!(summary.replayed, 2);
        assert_eq!(summary.end, PassEnd::Drained);
        assert_eq!(broker.published("payments").len(), 2);
        assert_eq!(broker.depth("payments.dlq"), 0);
        assert!(broker.is_declared("payments.dlq"));
        assert_eq!(ctx.metrics.snapshot().replayed, 2);
        // Only the consuming channel is still open; publish channels closed.
        assert_eq!(broker.channel_prefetches(), vec![ctx.prefetch]);

        p.shutdown().await;
        assert_eq!(broker.open_channels(), 0);
        assert!(broker.channel_prefetches().is_empty());
    }

    #[tokio::test]
    async fn channel_is_reused_across_passes() {
        let broker = MemoryBroker::new();
        let mut p = QueueProcessor::new("payments.dlq", context(&broker, 10));
        p.process_pass(&CancellationToken::new()).await;
        p.process_pass(&CancellationToken::new()).await;
        assert_eq!(broker.open_channels(), 1);
        p.shutdown().await;
    }

    #[tokio::test]
    async fn batch_cap_limits_pass() {
        let broker = MemoryBroker::new();
        for _ in 0..5 {
            broker.push("payments.dlq", message(0, "payments"));
        }
        let mut p = QueueProcessor::new("payments.dlq", context(&broker, 3));

        let summary = p.process_pass(&CancellationToken::new()).await;
        assert_eq!(summary.replayed, 3);
        assert_eq!(summary.end, PassEnd::BatchLimit);
        assert_eq!(broker.depth("payments.dlq"), 2);
        p.shutdown().await;
    }

    #[tokio::test]
    async fn security_rejection_drops_message() {
        let broker = MemoryBroker::new();
        broker.push("payments.dlq", message(0, "admin_commands"));
        let ctx = context(&broker, 10);
        let mut p = QueueProcessor::new("payments.dlq", Arc::clone(&ctx));

        let summary = p.process_pass(&CancellationToken::new()).await;
        assert_eq!(summary.rejected, 1);
        assert_eq!(broker.depth("payments.dlq"), 0);
        assert!(broker.published("admin_commands").is_empty());
        assert_eq!(ctx.metrics.snapshot().security_rejected, 1);
        p.shutdown().await;
    }

    #[tokio::test]
    async fn exhausted_budget_is_discarded() {
        let broker = MemoryBroker::new();
        broker.push("payments.dlq", message(10, "payments"));
        let ctx = context(&broker, 10);
        let mut p = QueueProcessor::new("payments.dlq", Arc::clone(&ctx));

        let summary = p.process_pass(&CancellationToken::new()).await;
        assert_eq!(summary.lost, 1);
        assert_eq!(broker.depth("payments.dlq"), 0);
        assert!(broker.published("payments").is_empty());
        assert_eq!(ctx.metrics.snapshot().permanently_lost, 1);
        p.shutdown().await;
    }

    #[tokio::test]
    async fn deferral_ends_the_pass() {
        let broker = MemoryBroker::new();
        let mut early = message(2, "payments");
        early.headers.insert(DLQ_TIMESTAMP, NOW - 240);
        broker.push("payments.dlq", early);
        broker.push("payments.dlq", message(0, "payments"));
        let mut p = QueueProcessor::new("payments.dlq", context(&broker, 10));

        let summary = p.process_pass(&CancellationToken::new()).await;
        assert_eq!(summary.deferred, 1);
        assert_eq!(summary.end, PassEnd::Requeued);
        assert_eq!(broker.depth("payments.dlq"), 2);
        assert_eq!(broker.ready("payments.dlq")[0].body, b"retry-2");
        assert!(broker.published("payments").is_empty());
        p.shutdown().await;
    }

    #[tokio::test]
    async fn failed_replay_requeues_and_ends_the_pass() {
        let broker = MemoryBroker::new();
        broker.set_confirm_behavior("payments", ConfirmBehavior::Nack);
        broker.push("payments.dlq", message(0, "payments"));
        broker.push("payments.dlq", message(1, "payments"));
        let ctx = context(&broker, 10);
        let mut p = QueueProcessor::new("payments.dlq", Arc::clone(&ctx));

        let summary = p.process_pass(&CancellationToken::new()).await;
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.end, PassEnd::Requeued);
        assert_eq!(broker.depth("payments.dlq"), 2);
        assert_eq!(ctx.metrics.snapshot().replay_failed, 1);
        p.shutdown().await;
    }

    #[tokio::test]
    async fn setup_failure_skips_tick_and_recovers() {
        let broker = MemoryBroker::new();
        broker.push("payments.dlq", message(0, "payments"));
        broker.fail_declare("payments.dlq");
        let ctx = context(&broker, 10);
        let mut p = QueueProcessor::new("payments.dlq", Arc::clone(&ctx));

        let summary = p.process_pass(&CancellationToken::new()).await;
        assert_eq!(summary.end, PassEnd::SetupFailed);
        assert_eq!(summary.processed(), 0);
        assert_eq!(ctx.metrics.snapshot().setup_failures, 1);
        assert_eq!(broker.open_channels(), 0);

        broker.heal();
        let summary = p.process_pass(&CancellationToken::new()).await;
        assert_eq!(summary.replayed, 1);
        p.shutdown().await;
    }

    #[tokio::test]
    async fn poll_failure_drops_channel() {
        let broker = MemoryBroker::new();
        broker.fail_get("payments.dlq");
        let mut p = QueueProcessor::new("payments.dlq", context(&broker, 10));

        let summary = p.process_pass(&CancellationToken::new()).await;
        assert_eq!(summary.end, PassEnd::ChannelLost);
        assert_eq!(broker.open_channels(), 0);
    }

    #[tokio::test]
    async fn cancelled_before_first_message() {
        let broker = MemoryBroker::new();
        broker.push("payments.dlq", message(0, "payments"));
        let mut p = QueueProcessor::new("payments.dlq", context(&broker, 10));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let summary = p.process_pass(&cancel).await;
        assert_eq!(summary.end, PassEnd::Cancelled);
        assert_eq!(broker.depth("payments.dlq"), 1);
        p.shutdown().await;
    }
}
