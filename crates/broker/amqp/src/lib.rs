//! AMQP 0-9-1 backend for the Lazarus broker abstraction.
//!
//! Built on [`lapin`]. A single connection is shared by all channels and is
//! re-established on demand. Messages are published through the default
//! exchange, routed by queue name, and marked persistent when the source
//! message was.
//!
//! # Example
//!
//! ```no_run
//! use lazarus_broker::Broker;
//! use lazarus_broker_amqp::{AmqpBroker, AmqpConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let broker = AmqpBroker::connect(AmqpConfig::new("amqp://localhost:5672/%2f")).await?;
//! let channel = broker.open_channel().await?;
//! channel.declare_queue("payments.dlq").await?;
//! # Ok(())
//! # }
//! ```

mod broker;
mod channel;
mod config;
mod headers;

pub use broker::AmqpBroker;
pub use channel::AmqpChannel;
pub use config::AmqpConfig;
