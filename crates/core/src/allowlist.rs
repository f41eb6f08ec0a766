use std::collections::BTreeSet;

use crate::error::CoreError;
use crate::headers::{
    DLQ_ORIGINAL_QUEUE, DLQ_REASON, DLQ_RETRY_COUNT, DLQ_TIMESTAMP, Headers, RETRY_COUNT,
};

/// Header keys copied onto a replayed message when no extras are configured.
pub const DEFAULT_ALLOWED_HEADERS: &[&str] = &[
    DLQ_RETRY_COUNT,
    DLQ_ORIGINAL_QUEUE,
    DLQ_REASON,
    DLQ_TIMESTAMP,
    "x-correlation-id",
    "x-request-id",
    "x-idempotency-key",
    "traceparent",
    "tracestate",
];

/// The set of header keys that survive replay.
///
/// Everything else is dropped, so a dead-lettered message cannot smuggle
/// routing or authorisation headers into the destination queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderAllowlist {
    keys: BTreeSet<String>,
}

impl HeaderAllowlist {
    /// Build an allowlist from the defaults plus `extra` keys.
    ///
    /// Keys are matched case-sensitively, as the broker does.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidHeader`] for an empty key or for the plain
    /// retry-count header, which is always stripped.
    pub fn with_extra<I, S>(extra: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::default();
        for key in extra {
            let key = key.as_ref().trim();
            if key.is_empty() || key == RETRY_COUNT {
                return Err(CoreError::InvalidHeader(key.to_owned()));
            }
            list.keys.insert(key.to_owned());
        }
        Ok(list)
    }

    pub fn allows(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Copy only the allowlisted entries of `headers`.
    pub fn filter(&self, headers: &Headers) -> Headers {
        headers
            .iter()
            .filter(|(key, _)| self.allows(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

impl Default for HeaderAllowlist {
    fn default() -> Self {
        Self {
            keys: DEFAULT_ALLOWED_HEADERS
                .iter()
                .map(|k| (*k).to_owned())
                .collect(),
        }
    }
}
