//! Typed access to broker message headers.
//!
//! Header values keep the encoding they arrived with so that allowlisted
//! headers can be forwarded verbatim. Decision logic never inspects the raw
//! encoding: the integer accessors normalise every integer width to `i64`.

use std::collections::BTreeMap;
use std::collections::btree_map;

/// Number of times a message has been replayed out of its dead-letter queue.
pub const DLQ_RETRY_COUNT: &str = "x-dlq-retry-count";

/// Name of the queue the message was originally consumed from.
pub const DLQ_ORIGINAL_QUEUE: &str = "x-dlq-original-queue";

/// Human-readable reason the primary consumer gave up on the message.
pub const DLQ_REASON: &str = "x-dlq-reason";

/// Unix timestamp (seconds) of the last failed processing attempt.
pub const DLQ_TIMESTAMP: &str = "x-dlq-timestamp";

/// Retry counter maintained by the primary consumer. Stripped on replay so the
/// destination queue's own retry accounting restarts.
pub const RETRY_COUNT: &str = "x-retry-count";

/// A single header value in its wire encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    /// Signed 32-bit integer (AMQP `long-int`).
    Int32(i32),
    /// Signed 64-bit integer (AMQP `long-long-int`).
    Int64(i64),
    /// UTF-8 string.
    Text(String),
    Bool(bool),
    Float(f64),
    /// Unsigned seconds since the Unix epoch.
    Timestamp(u64),
    /// Raw bytes that are not valid UTF-8 or have no typed equivalent.
    Bytes(Vec<u8>),
}

impl HeaderValue {
    /// Return the value as an `i64` if it carries an integer, regardless of
    /// the width it was encoded with.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int32(v) => Some(i64::from(*v)),
            Self::Int64(v) => Some(*v),
            Self::Timestamp(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Return the value as a string slice if it carries text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Return the value incremented by one, keeping the integer width.
    ///
    /// The second element is `true` when the increment would have overflowed;
    /// the value then saturates at the width's maximum. Non-integer values
    /// restart the count at 1.
    pub fn incremented(&self) -> (Self, bool) {
        match self {
            Self::Int32(v) => match v.checked_add(1) {
                Some(next) => (Self::Int32(next.max(1)), false),
                None => (Self::Int32(i32::MAX), true),
            },
            Self::Int64(v) => match v.checked_add(1) {
                Some(next) => (Self::Int64(next.max(1)), false),
                None => (Self::Int64(i64::MAX), true),
            },
            _ => (Self::Int32(1), false),
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i32> for HeaderValue {
    fn from(value: i32) -> Self {
        Self::Int32(value)
    }
}

impl From<i64> for HeaderValue {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

/// An ordered header map with typed accessors for the dead-letter contract.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headers {
    entries: BTreeMap<String, HeaderValue>,
}

impl Headers {
    /// Create an empty header set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, replacing any previous value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<HeaderValue>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Builder-style variant of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<HeaderValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<HeaderValue> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, HeaderValue> {
        self.entries.iter()
    }

    /// The dead-letter retry count, normalised to a non-negative `i64`.
    ///
    /// Missing, non-integer, and negative values all read as zero.
    pub fn dlq_retry_count(&self) -> i64 {
        self.get(DLQ_RETRY_COUNT)
            .and_then(HeaderValue::as_i64)
            .map_or(0, |v| v.max(0))
    }

    /// The original queue named by the message, if present and non-empty.
    pub fn dlq_original_queue(&self) -> Option<&str> {
        self.get(DLQ_ORIGINAL_QUEUE)
            .and_then(HeaderValue::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn dlq_reason(&self) -> Option<&str> {
        self.get(DLQ_REASON).and_then(HeaderValue::as_str)
    }

    /// The raw failure timestamp in Unix seconds. Callers must pass it through
    /// [`TimestampValidator`](crate::TimestampValidator) before trusting it.
    pub fn dlq_timestamp(&self) -> Option<i64> {
        self.get(DLQ_TIMESTAMP).and_then(HeaderValue::as_i64)
    }
}

impl FromIterator<(String, HeaderValue)> for Headers {
    fn from_iter<I: IntoIterator<Item = (String, HeaderValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = (&'a String, &'a HeaderValue);
    type IntoIter = btree_map::Iter<'a, String, HeaderValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
