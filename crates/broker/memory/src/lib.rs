mod broker;
mod channel;

pub use broker::{ConfirmBehavior, MemoryBroker};
pub use channel::MemoryChannel;
