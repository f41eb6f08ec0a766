use std::collections::BTreeMap;

use crate::error::CoreError;

/// Suffix appended to an original queue name to form its dead-letter queue.
pub const DLQ_SUFFIX: &str = ".dlq";

/// Return the dead-letter queue name for `original`.
///
/// # Examples
///
/// ```
/// assert_eq!(lazarus_core::dlq_name_for("payments"), "payments.dlq");
/// ```
pub fn dlq_name_for(original: &str) -> String {
    format!("{original}{DLQ_SUFFIX}")
}

/// Fixed mapping from monitored original queues to their dead-letter queues.
///
/// Built once at startup. A replay destination is valid only if it is one of
/// the original queue names held here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRegistry {
    /// Original queue name -> dead-letter queue name.
    by_original: BTreeMap<String, String>,
    /// Dead-letter queue name -> original queue name.
    by_dlq: BTreeMap<String, String>,
}

impl QueueRegistry {
    /// Build a registry from the original queue names to monitor.
    ///
    /// Names are trimmed and duplicates collapsed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] if no queues are given, a name is empty, or a
    /// name already ends with [`DLQ_SUFFIX`].
    pub fn new<I, S>(queues: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut by_original = BTreeMap::new();
        let mut by_dlq = BTreeMap::new();

        for queue in queues {
            let raw = queue.as_ref();
            let name = raw.trim();
            if name.is_empty() {
                return Err(CoreError::EmptyQueueName(raw.to_owned()));
            }
            if name.ends_with(DLQ_SUFFIX) {
                return Err(CoreError::DeadLetterName(name.to_owned()));
            }
            let dlq = dlq_name_for(name);
            by_dlq.insert(dlq.clone(), name.to_owned());
            by_original.insert(name.to_owned(), dlq);
        }

        if by_original.is_empty() {
            return Err(CoreError::EmptyRegistry);
        }

        Ok(Self {
            by_original,
            by_dlq,
        })
    }

    /// Whether `queue` is a registered original queue (a valid replay target).
    pub fn contains(&self, queue: &str) -> bool {
        self.by_original.contains_key(queue)
    }

    /// The dead-letter queue paired with `original`.
    pub fn dlq_for(&self, original: &str) -> Option<&str> {
        self.by_original.get(original).map(String::as_str)
    }

    /// The original queue a dead-letter queue belongs to.
    pub fn origin_of(&self, dlq: &str) -> Option<&str> {
        self.by_dlq.get(dlq).map(String::as_str)
    }

    /// Iterate `(original, dead_letter)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_original
            .iter()
            .map(|(orig, dlq)| (orig.as_str(), dlq.as_str()))
    }

    pub fn len(&self) -> usize {
        self.by_original.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_original.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_both_directions() {
        let reg = QueueRegistry::new(["payments", "balances"]).unwrap();
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.dlq_for("payments"), Some("payments.dlq"));
        assert_eq!(reg.origin_of("balances.dlq"), Some("balances"));
        assert!(reg.contains("payments"));
        assert!(!reg.contains("payments.dlq"));
        assert!(!reg.contains("admin.secrets"));
    }

    #[test]
    fn trims_and_deduplicates() {
        let reg = QueueRegistry::new([" payments ", "payments"]).unwrap();
        assert_eq!(reg.len(), 1);
        assert!(reg.contains("payments"));
    }

    #[test]
    fn rejects_invalid_names() {
        assert_eq!(
            QueueRegistry::new(Vec::<String>::new()),
            Err(CoreError::EmptyRegistry)
        );
        assert!(matches!(
            QueueRegistry::new(["  "]),
            Err(CoreError::EmptyQueueName(_))
        ));
        assert_eq!(
            QueueRegistry::new(["payments.dlq"]),
            Err(CoreError::DeadLetterName("payments.dlq".into()))
        );
    }

    #[test]
    fn iterates_in_name_order() {
        let reg = QueueRegistry::new(["transactions", "balances"]).unwrap();
        let pairs: Vec<_> = reg.iter().collect();
        assert_eq!(
            pairs,
            vec![
                ("balances", "balances.dlq"),
                ("transactions", "transactions.dlq")
            ]
        );
    }
}
