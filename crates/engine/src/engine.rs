use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use lazarus_broker::Broker;
use lazarus_core::{Clock, HeaderAllowlist, QueueRegistry, SystemClock};
use lazarus_health::{HealthGate, HealthSnapshot};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::metrics::ReplayMetrics;
use crate::poller::{Poller, gated_tick};
use crate::policy::ReplayPolicy;
use crate::processor::{PassSummary, QueueProcessor, ReplayContext};
use crate::publisher::ReplayPublisher;
use crate::validator::ReplayValidator;
use crate::worker::supervise;

/// Result of a single health-gated pass over every queue.
#[derive(Debug, Clone, Default)]
pub struct OnceReport {
    pub health: HealthSnapshot,
    /// One entry per dead-letter queue; empty when the tick was skipped.
    pub passes: Vec<PassSummary>,
}

impl OnceReport {
    pub fn skipped(&self) -> bool {
        !self.health.is_healthy()
    }
}

/// The dead-letter replay engine.
///
/// Owns the shared replay components and the set of dead-letter queues to
/// drain. Use [`run`](Self::run) for the long-running supervised mode and
/// [`run_once`](Self::run_once) for a single pass.
#[derive(Debug)]
pub struct ReplayEngine {
    context: Arc<ReplayContext>,
    registry: Arc<QueueRegistry>,
    gate: HealthGate,
    config: EngineConfig,
}

impl ReplayEngine {
    pub fn builder() -> ReplayEngineBuilder {
        ReplayEngineBuilder::new()
    }

    pub fn metrics(&self) -> Arc<ReplayMetrics> {
        Arc::clone(&self.context.metrics)
    }

    pub fn registry(&self) -> &QueueRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run until `cancel` fires.
    ///
    /// One supervised worker is started per dead-letter queue, then the
    /// poller ticks until shutdown. Returns once every worker has finished
    /// its in-flight message and closed its channel.
    pub async fn run(&self, cancel: CancellationToken) {
        let (ticks_tx, ticks_rx) = watch::channel(0u64);
        let mut workers = JoinSet::new();

        for (_, dlq) in self.registry.iter() {
            workers.spawn(supervise(
                dlq.to_owned(),
                Arc::clone(&self.context),
                ticks_rx.clone(),
                cancel.clone(),
                self.config.worker_restart_delay,
            ));
        }
        drop(ticks_rx);
        info!(queues = self.registry.len(), "replay engine started");

        let poller = Poller::new(
            self.gate.clone(),
            ticks_tx,
            self.config.poll_interval,
            Arc::clone(&self.context.metrics),
        );
        poller.run(&cancel).await;
        drop(poller);

        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "worker supervisor failed");
            }
        }
        info!("replay engine stopped");
    }

    /// Perform one health-gated pass over every queue, concurrently.
    pub async fn run_once(&self, cancel: &CancellationToken) -> OnceReport {
        let (health, healthy) = gated_tick(&self.gate, &self.context.metrics).await;
        if !healthy {
            return OnceReport {
                health,
                passes: Vec::new(),
            };
        }

        let mut processors: Vec<QueueProcessor> = self
            .registry
            .iter()
            .map(|(_, dlq)| QueueProcessor::new(dlq, Arc::clone(&self.context)))
            .collect();
        let passes = join_all(processors.iter_mut().map(|p| p.process_pass(cancel))).await;
        for processor in &mut processors {
            processor.shutdown().await;
        }

        OnceReport { health, passes }
    }
}

/// Fluent builder for [`ReplayEngine`].
///
/// A broker, a queue registry, and a health gate are required. Everything
/// else has defaults: the built-in header allowlist, the system clock, and
/// [`EngineConfig::default`].
pub struct ReplayEngineBuilder {
    broker: Option<Arc<dyn Broker>>,
    registry: Option<QueueRegistry>,
    gate: Option<HealthGate>,
    allowlist: HeaderAllowlist,
    clock: Arc<dyn Clock>,
    metrics: Option<Arc<ReplayMetrics>>,
    config: EngineConfig,
}

impl ReplayEngineBuilder {
    pub fn new() -> Self {
        Self {
            broker: None,
            registry: None,
            gate: None,
            allowlist: HeaderAllowlist::default(),
            clock: Arc::new(SystemClock),
            metrics: None,
            config: EngineConfig::default(),
        }
    }

    #[must_use]
    pub fn broker(mut self, broker: Arc<dyn Broker>) -> Self {
        self.broker = Some(broker);
        self
    }

    #[must_use]
    pub fn registry(mut self, registry: QueueRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    #[must_use]
    pub fn health_gate(mut self, gate: HealthGate) -> Self {
        self.gate = Some(gate);
        self
    }

    #[must_use]
    pub fn allowlist(mut self, allowlist: HeaderAllowlist) -> Self {
        self.allowlist = allowlist;
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Share an existing metrics instance instead of creating one.
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<ReplayMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] if a required component is
    /// missing or a tunable is zero.
    pub fn build(self) -> Result<ReplayEngine, EngineError> {
        let broker = self
            .broker
            .ok_or_else(|| EngineError::Configuration("broker is required".into()))?;
        let registry = self
            .registry
            .ok_or_else(|| EngineError::Configuration("queue registry is required".into()))?;
        let gate = self
            .gate
            .ok_or_else(|| EngineError::Configuration("health gate is required".into()))?;
        validate_config(&self.config)?;

        let registry = Arc::new(registry);
        let context = ReplayContext {
            broker: Arc::clone(&broker),
            validator: ReplayValidator::new(Arc::clone(&registry)),
            policy: ReplayPolicy::new(self.config.max_retries, self.clock),
            publisher: ReplayPublisher::new(
                broker,
                Arc::new(self.allowlist),
                self.config.confirm_timeout,
            ),
            metrics: self.metrics.unwrap_or_default(),
            batch_size: self.config.batch_size,
            prefetch: self.config.prefetch,
        };

        Ok(ReplayEngine {
            context: Arc::new(context),
            registry,
            gate,
            config: self.config,
        })
    }
}

impl Default for ReplayEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_config(config: &EngineConfig) -> Result<(), EngineError> {
    let zero = |what: &str| Err(EngineError::Configuration(format!("{what} must be non-zero")));
    if config.poll_interval.is_zero() {
        return zero("poll interval");
    }
    if config.batch_size == 0 {
        return zero("batch size");
    }
    if config.prefetch == 0 {
        return zero("prefetch");
    }
    if config.confirm_timeout.is_zero() {
        return zero("confirm timeout");
    }
    if config.max_retries <= 0 {
        return Err(EngineError::Configuration("max retries must be positive".into()));
    }
    Ok(())
}
