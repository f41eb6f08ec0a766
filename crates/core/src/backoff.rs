use std::time::Duration;

/// Wait required before replaying a message, indexed by its dead-letter retry
/// count. The last entry is the ceiling for every higher count.
const TIERS: [Duration; 5] = [
    Duration::ZERO,
    Duration::from_secs(60),
    Duration::from_secs(5 * 60),
    Duration::from_secs(15 * 60),
    Duration::from_secs(30 * 60),
];

/// Result of comparing a message's last failure against the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// First replay; no wait applies.
    Immediate,
    /// The required wait has elapsed.
    Elapsed,
    /// No usable timestamp. Replay proceeds so the message cannot get stuck.
    Unknown,
    /// Too soon; `remaining` is left to wait.
    Deferred { remaining: Duration },
}

impl Eligibility {
    pub fn is_eligible(self) -> bool {
        !matches!(self, Self::Deferred { .. })
    }
}

/// Fixed retry-count → wait-interval table.
///
/// | retry count | wait   |
/// |-------------|--------|
/// | 0           | none   |
/// | 1           | 1 min  |
/// | 2           | 5 min  |
/// | 3           | 15 min |
/// | ≥ 4         | 30 min |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackoffSchedule;

impl BackoffSchedule {
    /// The minimum time that must pass after a failure before a message with
    /// `retry_count` previous replays may be replayed again.
    pub fn required_wait(self, retry_count: i64) -> Duration {
        let idx = usize::try_from(retry_count.max(0)).unwrap_or(usize::MAX);
        TIERS[idx.min(TIERS.len() - 1)]
    }

    /// Decide whether a message may be replayed at `now`.
    ///
    /// `last_failure` must already have been through
    /// [`TimestampValidator`](crate::TimestampValidator).
    pub fn eligibility(self, retry_count: i64, last_failure: Option<i64>, now: i64) -> Eligibility {
        if retry_count <= 0 {
            return Eligibility::Immediate;
        }
        let Some(last_failure) = last_failure else {
            return Eligibility::Unknown;
        };

        let required = self.required_wait(retry_count);
        let elapsed = u64::try_from(now.saturating_sub(last_failure)).unwrap_or(0);
        let elapsed = Duration::from_secs(elapsed);

        if elapsed >= required {
            Eligibility::Elapsed
        } else {
            Eligibility::Deferred {
                remaining: required - elapsed,
            }
        }
    }
}
