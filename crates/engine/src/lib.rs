//! Dead-letter replay engine.
//!
//! Messages that the primary consumer gave up on land in `<queue>.dlq`. On
//! every healthy tick, one worker per dead-letter queue pulls messages one at
//! a time and settles each with exactly one terminal action:
//!
//! - target not registered: drop, logged as a security event
//! - retry budget spent: drop, logged as permanent loss
//! - backoff not elapsed: requeue
//! - replay confirmed by the broker: remove from the dead-letter queue
//! - replay not confirmed: requeue
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use lazarus_broker_memory::MemoryBroker;
//! use lazarus_core::QueueRegistry;
//! use lazarus_engine::ReplayEngine;
//! use lazarus_health::{HealthGate, StaticProbe};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = ReplayEngine::builder()
//!     .broker(Arc::new(MemoryBroker::new()))
//!     .registry(QueueRegistry::new(["payments", "balances"])?)
//!     .health_gate(HealthGate::default().with_probe(Arc::new(StaticProbe::healthy("db"))))
//!     .build()?;
//! engine.run(CancellationToken::new()).await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod poller;
pub mod policy;
pub mod processor;
pub mod publisher;
pub mod validator;
mod worker;

pub use config::EngineConfig;
pub use engine::{OnceReport, ReplayEngine, ReplayEngineBuilder};
pub use error::{EngineError, ValidationError};
pub use metrics::{MetricsSnapshot, ReplayMetrics};
pub use poller::Poller;
pub use policy::{Decision, ReplayPolicy};
pub use processor::{Disposition, PassEnd, PassSummary, QueueProcessor, ReplayContext};
pub use publisher::{ReplayFailure, ReplayPublisher};
pub use validator::ReplayValidator;
