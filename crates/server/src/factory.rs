//! Builds the engine's components from [`LazarusConfig`].

use std::sync::Arc;

use tracing::info;

use lazarus_broker::Broker;
use lazarus_broker_amqp::AmqpBroker;
use lazarus_engine::ReplayEngine;
use lazarus_health::{HealthError, HealthGate};
use lazarus_health_postgres::PostgresProbe;
use lazarus_health_redis::RedisProbe;

use crate::config::{BrokerConfig, HealthConfig, LazarusConfig};
use crate::error::ServerError;

/// Create the AMQP broker. The connection opens on first use.
pub fn create_broker(config: &BrokerConfig) -> Arc<dyn Broker> {
    Arc::new(AmqpBroker::new(config.to_amqp_config()))
}

/// Create a health gate with one probe per configured dependency.
///
/// Neither probe connects here; the first tick does.
pub fn create_health_gate(config: &HealthConfig) -> Result<HealthGate, HealthError> {
    let mut gate = HealthGate::new(config.timeout());
    if let Some(ref postgres) = config.postgres {
        gate = gate.with_probe(Arc::new(PostgresProbe::new(&postgres.to_probe_config())?));
        info!("postgres health probe configured");
    }
    if let Some(ref redis) = config.redis {
        gate = gate.with_probe(Arc::new(RedisProbe::new(&redis.to_probe_config())?));
        info!("redis health probe configured");
    }
    Ok(gate)
}

/// Assemble the replay engine. `config` must already be validated.
pub fn build_engine(
    config: &LazarusConfig,
    broker: Arc<dyn Broker>,
    gate: HealthGate,
) -> Result<ReplayEngine, ServerError> {
    let registry = config.replay.registry()?;
    let allowlist = config.replay.allowlist()?;
    let engine = ReplayEngine::builder()
        .broker(broker)
        .registry(registry)
        .allowlist(allowlist)
        .health_gate(gate)
        .config(config.replay.to_engine_config())
        .build()?;
    Ok(engine)
}
