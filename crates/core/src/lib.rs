//! Core types for the Lazarus dead-letter replay engine.
//!
//! Everything in this crate is pure and immutable once built: the wire header
//! contract, the [`QueueRegistry`] of valid replay targets, the
//! [`HeaderAllowlist`], the [`BackoffSchedule`], and the
//! [`TimestampValidator`]. They are constructed once at startup and shared by
//! reference.

pub mod allowlist;
pub mod backoff;
pub mod clock;
pub mod error;
pub mod headers;
pub mod message;
pub mod registry;
pub mod timestamp;

pub use allowlist::{DEFAULT_ALLOWED_HEADERS, HeaderAllowlist};
pub use backoff::{BackoffSchedule, Eligibility};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::CoreError;
pub use headers::{HeaderValue, Headers};
pub use message::Message;
pub use registry::{DLQ_SUFFIX, QueueRegistry, dlq_name_for};
pub use timestamp::TimestampValidator;
