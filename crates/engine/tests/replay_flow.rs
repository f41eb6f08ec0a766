use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use lazarus_broker::{Broker, BrokerChannel, BrokerError};
use lazarus_broker_memory::{ConfirmBehavior, MemoryBroker};
use lazarus_core::headers::{
    DLQ_ORIGINAL_QUEUE, DLQ_REASON, DLQ_RETRY_COUNT, DLQ_TIMESTAMP, RETRY_COUNT,
};
use lazarus_core::{HeaderValue, Headers, ManualClock, Message, QueueRegistry};
use lazarus_engine::{EngineConfig, PassEnd, ReplayEngine};
use lazarus_health::{HealthGate, StaticProbe};

const NOW: i64 = 1_700_000_000;

struct Harness {
    broker: MemoryBroker,
    clock: Arc<ManualClock>,
    database: Arc<StaticProbe>,
    engine: ReplayEngine,
}

fn harness_with(broker: Arc<dyn Broker>, memory: MemoryBroker, config: EngineConfig) -> Harness {
    let clock = Arc::new(ManualClock::new(NOW));
    let database = Arc::new(StaticProbe::healthy("postgres"));
    let engine = ReplayEngine::builder()
        .broker(broker)
        .registry(QueueRegistry::new(["payments", "balances"]).unwrap())
        .health_gate(
            HealthGate::new(Duration::from_secs(5))
                .with_probe(database.clone())
                .with_probe(Arc::new(StaticProbe::healthy("redis"))),
        )
        .clock(clock.clone())
        .config(config)
        .build()
        .unwrap();
    Harness {
        broker: memory,
        clock,
        database,
        engine,
    }
}

fn harness() -> Harness {
    let broker = MemoryBroker::new();
    harness_with(Arc::new(broker.clone()), broker, EngineConfig::default())
}

fn dead_letter(retry: i32, target: &str) -> Message {
    Message::new(br#"{"amount":"99.10","currency":"EUR"}"#.to_vec())
        .with_content_type("application/json")
        .with_headers(
            Headers::new()
                .with(DLQ_RETRY_COUNT, retry)
                .with(DLQ_ORIGINAL_QUEUE, target)
                .with(DLQ_REASON, "downstream timeout")
                .with(DLQ_TIMESTAMP, NOW - 3600)
                .with(RETRY_COUNT, 5i32)
                .with("x-correlation-id", "corr-42")
                .with("x-death", "[]"),
        )
        .persistent()
}

#[tokio::test]
async fn first_replay_reaches_origin_queue() {
    let h = harness();
    h.broker.push("payments.dlq", dead_letter(0, "payments"));

    let report = h.engine.run_once(&CancellationToken::new()).await;
    assert!(!report.skipped());
    assert_eq!(report.passes.len(), 2);

    assert_eq!(h.broker.depth("payments.dlq"), 0);
    assert_eq!(h.broker.unacked("payments.dlq"), 0);
    let published = h.broker.published("payments");
    assert_eq!(published.len(), 1);

    let replayed = &published[0];
    assert_eq!(replayed.body, dead_letter(0, "payments").body);
    assert_eq!(replayed.content_type.as_deref(), Some("application/json"));
    assert!(replayed.persistent);
    assert_eq!(replayed.headers.get(DLQ_RETRY_COUNT), Some(&HeaderValue::Int32(1)));
    assert_eq!(replayed.headers.dlq_original_queue(), Some("payments"));
    assert!(replayed.headers.contains_key("x-correlation-id"));
    assert!(!replayed.headers.contains_key(RETRY_COUNT));
    assert!(!replayed.headers.contains_key("x-death"));

    assert_eq!(h.engine.metrics().snapshot().replayed, 1);
    assert_eq!(h.broker.open_channels(), 0);
}

#[tokio::test]
async fn unregistered_target_is_dropped_not_replayed() {
    let h = harness();
    h.broker.push("payments.dlq", dead_letter(0, "admin_commands"));

    h.engine.run_once(&CancellationToken::new()).await;

    assert_eq!(h.broker.depth("payments.dlq"), 0);
    assert!(h.broker.published("admin_commands").is_empty());
    assert!(h.broker.published("payments").is_empty());
    assert_eq!(h.engine.metrics().snapshot().security_rejected, 1);
}

#[tokio::test]
async fn missing_target_header_uses_queue_origin() {
    let h = harness();
    let mut msg = dead_letter(0, "ignored");
    msg.headers.remove(DLQ_ORIGINAL_QUEUE);
    h.broker.push("balances.dlq", msg);

    h.engine.run_once(&CancellationToken::new()).await;
    assert_eq!(h.broker.published("balances").len(), 1);
}

#[tokio::test]
async fn exhausted_budget_is_discarded_without_publishing() {
    let h = harness();
    let mut msg = dead_letter(10, "payments");
    // Budget wins even when the backoff has not elapsed.
    msg.headers.insert(DLQ_TIMESTAMP, NOW);
    h.broker.push("payments.dlq", msg);

    h.engine.run_once(&CancellationToken::new()).await;

    assert_eq!(h.broker.depth("payments.dlq"), 0);
    assert!(h.broker.published("payments").is_empty());
    assert_eq!(h.engine.metrics().snapshot().permanently_lost, 1);
}

#[tokio::test]
async fn backoff_defers_then_replays() {
    let h = harness();
    let mut msg = dead_letter(2, "payments");
    msg.headers.insert(DLQ_TIMESTAMP, NOW - 240);
    h.broker.push("payments.dlq", msg);

    let report = h.engine.run_once(&CancellationToken::new()).await;
    let pass = report.passes.iter().find(|p| p.queue == "payments.dlq").unwrap();
    assert_eq!(pass.deferred, 1);
    assert_eq!(pass.end, PassEnd::Requeued);
    assert_eq!(h.broker.depth("payments.dlq"), 1);
    assert!(h.broker.published("payments").is_empty());

    h.clock.advance(120);
    h.engine.run_once(&CancellationToken::new()).await;
    assert_eq!(h.broker.depth("payments.dlq"), 0);
    let published = h.broker.published("payments");
    assert_eq!(published[0].headers.dlq_retry_count(), 3);
}

#[tokio::test]
async fn sixty_four_bit_count_keeps_its_width() {
    let h = harness();
    let mut msg = dead_letter(0, "payments");
    msg.headers.insert(DLQ_RETRY_COUNT, 1i64);
    h.broker.push("payments.dlq", msg);

    h.engine.run_once(&CancellationToken::new()).await;
    let published = h.broker.published("payments");
    assert_eq!(published[0].headers.get(DLQ_RETRY_COUNT), Some(&HeaderValue::Int64(2)));
}

#[tokio::test]
async fn nacked_replay_keeps_source_message() {
    let h = harness();
    h.broker.set_confirm_behavior("payments", ConfirmBehavior::Nack);
    h.broker.push("payments.dlq", dead_letter(0, "payments"));

    h.engine.run_once(&CancellationToken::new()).await;

    assert_eq!(h.broker.depth("payments.dlq"), 1);
    assert_eq!(h.broker.unacked("payments.dlq"), 0);
    assert!(h.broker.published("payments").is_empty());
    assert_eq!(h.engine.metrics().snapshot().replay_failed, 1);
}

#[tokio::test(start_paused = true)]
async fn unconfirmed_replay_times_out_and_requeues() {
    let h = harness();
    h.broker.set_confirm_behavior("payments", ConfirmBehavior::Hang);
    h.broker.push("payments.dlq", dead_letter(0, "payments"));

    h.engine.run_once(&CancellationToken::new()).await;

    assert_eq!(h.broker.depth("payments.dlq"), 1);
    assert!(h.broker.published("payments").is_empty());
    assert_eq!(h.broker.open_channels(), 0);
}

#[tokio::test]
async fn unhealthy_tick_leaves_queues_untouched() {
    let h = harness();
    h.broker.push("payments.dlq", dead_letter(0, "payments"));
    h.database.set_healthy(false);

    let report = h.engine.run_once(&CancellationToken::new()).await;

    assert!(report.skipped());
    assert!(report.passes.is_empty());
    assert_eq!(report.health.failing(), vec!["postgres"]);
    assert_eq!(h.broker.depth("payments.dlq"), 1);
    assert!(!h.broker.is_declared("payments.dlq"));
    assert_eq!(h.engine.metrics().snapshot().ticks_skipped_unhealthy, 1);
}

#[tokio::test]
async fn one_broken_queue_does_not_block_another() {
    let h = harness();
    h.broker.push("payments.dlq", dead_letter(0, "payments"));
    h.broker.push("balances.dlq", dead_letter(0, "balances"));
    h.broker.fail_declare("payments.dlq");

    let report = h.engine.run_once(&CancellationToken::new()).await;

    let payments = report.passes.iter().find(|p| p.queue == "payments.dlq").unwrap();
    assert_eq!(payments.end, PassEnd::SetupFailed);
    assert_eq!(h.broker.depth("payments.dlq"), 1);
    assert_eq!(h.broker.published("balances").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn supervised_run_replays_on_ticks_and_stops_cleanly() {
    let h = harness();
    h.broker.push("payments.dlq", dead_letter(0, "payments"));
    let cancel = CancellationToken::new();
    let engine = Arc::new(h.engine);

    let task = {
        let engine = Arc::clone(&engine);
        let cancel = cancel.clone();
        tokio::spawn(async move { engine.run(cancel).await })
    };

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.broker.published("payments").len(), 1);

    h.broker.push("balances.dlq", dead_letter(0, "balances"));
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.broker.published("balances").len(), 1);

    cancel.cancel();
    task.await.unwrap();
    assert_eq!(h.broker.open_channels(), 0);
    assert!(engine.metrics().snapshot().ticks >= 2);
}

#[tokio::test(start_paused = true)]
async fn first_tick_replays_without_waiting_a_full_interval() {
    let h = harness();
    h.broker.push("payments.dlq", dead_letter(0, "payments"));
    let cancel = CancellationToken::new();
    let engine = Arc::new(h.engine);

    let task = {
        let engine = Arc::clone(&engine);
        let cancel = cancel.clone();
        tokio::spawn(async move { engine.run(cancel).await })
    };

    tokio::time::sleep(Duration::from_secs(9)).await;
    assert_eq!(engine.metrics().snapshot().ticks, 1);
    assert_eq!(h.broker.published("payments").len(), 1);
    assert_eq!(h.broker.depth("payments.dlq"), 0);

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn shutdown_mid_replay_settles_the_message() {
    let h = harness();
    h.broker.set_confirm_behavior("payments", ConfirmBehavior::Hang);
    h.broker.push("payments.dlq", dead_letter(0, "payments"));
    let cancel = CancellationToken::new();
    let engine = Arc::new(h.engine);

    let task = {
        let engine = Arc::clone(&engine);
        let cancel = cancel.clone();
        tokio::spawn(async move { engine.run(cancel).await })
    };

    // The replay is now waiting on a confirmation that never comes.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.broker.unacked("payments.dlq"), 1);
    cancel.cancel();
    task.await.unwrap();

    assert_eq!(h.broker.unacked("payments.dlq"), 0);
    assert_eq!(h.broker.depth("payments.dlq"), 1);
    assert_eq!(h.broker.open_channels(), 0);
}

/// Panics on the first channel open, then delegates.
struct PanicOnceBroker {
    inner: MemoryBroker,
    opens: AtomicU32,
}

#[async_trait]
impl Broker for PanicOnceBroker {
    async fn open_channel(&self) -> Result<Box<dyn BrokerChannel>, BrokerError> {
        assert!(
            self.opens.fetch_add(1, Ordering::SeqCst) > 0,
            "simulated worker crash"
        );
        self.inner.open_channel().await
    }
}

#[tokio::test(start_paused = true)]
async fn panicking_worker_is_restarted() {
    let memory = MemoryBroker::new();
    let broker = Arc::new(PanicOnceBroker {
        inner: memory.clone(),
        opens: AtomicU32::new(0),
    });
    let config = EngineConfig {
        worker_restart_delay: Duration::from_secs(1),
        ..EngineConfig::default()
    };
    let h = harness_with(broker, memory, config);
    // One queue panics on the first tick; the other is unaffected either way.
    h.broker.push("balances.dlq", dead_letter(0, "balances"));
    h.broker.push("payments.dlq", dead_letter(0, "payments"));

    let cancel = CancellationToken::new();
    let engine = Arc::new(h.engine);
    let task = {
        let engine = Arc::clone(&engine);
        let cancel = cancel.clone();
        tokio::spawn(async move { engine.run(cancel).await })
    };

    tokio::time::sleep(Duration::from_secs(15)).await;
    cancel.cancel();
    task.await.unwrap();

    let snap = engine.metrics().snapshot();
    assert_eq!(snap.worker_restarts, 1);
    assert_eq!(h.broker.published("balances").len(), 1);
    assert_eq!(h.broker.published("payments").len(), 1);
    assert_eq!(h.broker.depth("payments.dlq"), 0);
    assert_eq!(h.broker.depth("balances.dlq"), 0);
}
