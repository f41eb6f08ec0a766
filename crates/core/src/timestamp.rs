use std::time::Duration;

/// How far ahead of the local clock a header timestamp may be before it is
/// treated as clock skew.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(3600);

/// Oldest header timestamp honoured as-is.
pub const MAX_TIMESTAMP_AGE: Duration = Duration::from_secs(30 * 24 * 3600);

/// Clamps externally supplied failure timestamps into a trustworthy window.
///
/// A timestamp in the far future would postpone replay indefinitely; one in
/// the distant past would make elapsed-time arithmetic meaningless. Both are
/// pulled back inside `[now - max_age, now]` (future values within the skew
/// allowance are kept).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampValidator {
    max_skew: i64,
    max_age: i64,
}

impl TimestampValidator {
    /// Validate a raw Unix-seconds timestamp against `now`.
    ///
    /// Returns `None` when the timestamp is missing, zero, or negative.
    ///
    /// # Examples
    ///
    /// ```
    /// use lazarus_core::TimestampValidator;
    ///
    /// let v = TimestampValidator::default();
    /// let now = 1_700_000_000;
    /// assert_eq!(v.validate(Some(now - 60), now), Some(now - 60));
    /// assert_eq!(v.validate(Some(now + 7200), now), Some(now));
    /// assert_eq!(v.validate(Some(0), now), None);
    /// ```
    pub fn validate(&self, raw: Option<i64>, now: i64) -> Option<i64> {
        let ts = raw.filter(|ts| *ts > 0)?;

        if ts > now.saturating_add(self.max_skew) {
            return Some(now);
        }

        let oldest = now.saturating_sub(self.max_age);
        if ts < oldest {
            return Some(oldest);
        }

        Some(ts)
    }
}

impl Default for TimestampValidator {
    #[allow(clippy::cast_possible_wrap)]
    fn default() -> Self {
        Self {
            max_skew: MAX_CLOCK_SKEW.as_secs() as i64,
            max_age: MAX_TIMESTAMP_AGE.as_secs() as i64,
        }
    }
}
