use std::sync::Arc;
use std::time::Duration;

use lazarus_core::{BackoffSchedule, Clock, Eligibility, Headers, TimestampValidator};

/// Outcome of the retry-budget and backoff checks for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The retry budget is spent; the message must be discarded.
    Exhausted { retry_count: i64 },
    /// The backoff for this retry count has not elapsed yet.
    Defer { retry_count: i64, remaining: Duration },
    /// The message may be replayed now.
    Replay {
        retry_count: i64,
        eligibility: Eligibility,
    },
}

/// Applies the retry budget, then the backoff schedule.
///
/// The budget is checked first so a message at or over the ceiling is never
/// published again, whatever its timestamp says.
#[derive(Clone)]
pub struct ReplayPolicy {
    max_retries: i64,
    schedule: BackoffSchedule,
    timestamps: TimestampValidator,
    clock: Arc<dyn Clock>,
}

impl ReplayPolicy {
    pub fn new(max_retries: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_retries,
            schedule: BackoffSchedule,
            timestamps: TimestampValidator::default(),
            clock,
        }
    }

    pub fn max_retries(&self) -> i64 {
        self.max_retries
    }

    pub fn decide(&self, headers: &Headers) -> Decision {
        let retry_count = headers.dlq_retry_count();
        if retry_count >= self.max_retries {
            return Decision::Exhausted { retry_count };
        }

        let now = self.clock.now_unix();
        let last_failure = self.timestamps.validate(headers.dlq_timestamp(), now);
        match self.schedule.eligibility(retry_count, last_failure, now) {
            Eligibility::Deferred { remaining } => Decision::Defer {
                retry_count,
                remaining,
            },
            eligibility => Decision::Replay {
                retry_count,
                eligibility,
            },
        }
    }
}

impl std::fmt::Debug for ReplayPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayPolicy")
            .field("max_retries", &self.max_retries)
            .field("schedule", &self.schedule)
            .field("timestamps", &self.timestamps)
            .finish_non_exhaustive()
    }
}
