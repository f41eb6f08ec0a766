//! Broker abstractions for the Lazarus replay engine.
//!
//! The engine only needs a handful of primitives: declare a durable queue,
//! bound the prefetch, poll one message without blocking, acknowledge or
//! requeue it, and publish with a broker confirmation. Backends implement
//! [`Broker`] and [`BrokerChannel`]; every delivered message is handed out as
//! a [`Lease`] that must be resolved exactly once.

pub mod broker;
pub mod error;
pub mod lease;
pub mod testing;

pub use broker::{Broker, BrokerChannel, Confirmation, PendingConfirm};
pub use error::BrokerError;
pub use lease::{Acknowledger, Lease};
