use std::sync::Arc;

use lazarus_core::{Headers, QueueRegistry};

use crate::error::ValidationError;

/// Decides where a dead-lettered message may be replayed to.
///
/// The message's own `x-dlq-original-queue` header is untrusted input: it is
/// honoured only when it names a registered queue. Without it, the target is
/// the registered origin of the dead-letter queue the message came from.
#[derive(Debug, Clone)]
pub struct ReplayValidator {
    registry: Arc<QueueRegistry>,
}

impl ReplayValidator {
    pub fn new(registry: Arc<QueueRegistry>) -> Self {
        Self { registry }
    }

    /// Resolve the replay destination for a message read from `dlq`.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the resolved target is not a
    /// registered queue.
    pub fn resolve<'a>(&'a self, dlq: &str, headers: &'a Headers) -> Result<&'a str, ValidationError> {
        let target = match headers.dlq_original_queue() {
            Some(named) => named,
            None => self
                .registry
                .origin_of(dlq)
                .ok_or_else(|| ValidationError::UnknownOrigin(dlq.to_owned()))?,
        };

        if self.registry.contains(target) {
            Ok(target)
        } else {
            Err(ValidationError::UnregisteredTarget(target.to_owned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use lazarus_core::headers::DLQ_ORIGINAL_QUEUE;

    use super::*;

    fn validator() -> ReplayValidator {
        ReplayValidator::new(Arc::new(QueueRegistry::new(["payments", "balances"]).unwrap()))
    }

    #[test]
    fn header_naming_registered_queue_wins() {
        let v = validator();
        let headers = Headers::new().with(DLQ_ORIGINAL_QUEUE, "balances");
        assert_eq!(v.resolve("payments.dlq", &headers), Ok("balances"));
    }

    #[test]
    fn missing_header_falls_back_to_origin() {
        let v = validator();
        assert_eq!(v.resolve("payments.dlq", &Headers::new()), Ok("payments"));
    }

    #[test]
    fn blank_header_falls_back_to_origin() {
        let v = validator();
        let headers = Headers::new().with(DLQ_ORIGINAL_QUEUE, "   ");
        assert_eq!(v.resolve("balances.dlq", &headers), Ok("balances"));
    }

    #[test]
    fn unregistered_target_is_rejected() {
        let v = validator();
        let headers = Headers::new().with(DLQ_ORIGINAL_QUEUE, "admin_commands");
        assert_eq!(
            v.resolve("payments.dlq", &headers),
            Err(ValidationError::UnregisteredTarget("admin_commands".into()))
        );
    }

    #[test]
    fn dead_letter_queue_is_not_a_target() {
        let v = validator();
        let headers = Headers::new().with(DLQ_ORIGINAL_QUEUE, "payments.dlq");
        assert!(v.resolve("payments.dlq", &headers).is_err());
    }

    #[test]
    fn unknown_dlq_without_header() {
        let v = validator();
        assert_eq!(
            v.resolve("other.dlq", &Headers::new()),
            Err(ValidationError::UnknownOrigin("other.dlq".into()))
        );
    }
}
