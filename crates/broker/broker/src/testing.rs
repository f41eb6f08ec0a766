use crate::broker::{Broker, Confirmation};
use crate::error::BrokerError;
use lazarus_core::{Headers, Message};

fn message(body: &str) -> Message {
    Message::new(body.as_bytes().to_vec())
        .with_content_type("application/json")
        .with_headers(
            Headers::new()
                .with("x-dlq-retry-count", 3i32)
                .with("x-dlq-original-queue", "payments"),
        )
        .persistent()
}

/// Run the broker conformance test suite.
///
/// `prefix` namespaces every queue the suite touches so it can run against a
/// shared live broker. Each test uses its own queue and leaves it empty.
///
/// # Errors
///
/// Returns an error if any broker operation fails unexpectedly.
pub async fn run_broker_conformance_tests(
    broker: &dyn Broker,
    prefix: &str,
) -> Result<(), BrokerError> {
    test_get_empty(broker, prefix).await?;
    test_publish_and_get(broker, prefix).await?;
    test_requeue(broker, prefix).await?;
    test_close_releases_lease(broker, prefix).await?;
    Ok(())
}

async fn test_get_empty(broker: &dyn Broker, prefix: &str) -> Result<(), BrokerError> {
    let queue = format!("{prefix}.empty");
    let ch = broker.open_channel().await?;
    ch.declare_queue(&queue).await?;
    assert!(ch.get(&queue).await?.is_none(), "empty queue should yield None");
    ch.close().await?;
    Ok(())
}

async fn test_publish_and_get(broker: &dyn Broker, prefix: &str) -> Result<(), BrokerError> {
    let queue = format!("{prefix}.publish");
    let ch = broker.open_channel().await?;
    ch.declare_queue(&queue).await?;
    ch.enable_confirms().await?;

    let sent = message("{\"amount\":100}");
    let confirm = ch.publish(&queue, &sent).await?.await;
    assert_eq!(confirm, Confirmation::Ack, "publish should be confirmed");

    let lease = ch.get(&queue).await?;
    let lease = lease.ok_or_else(|| BrokerError::Channel("published message missing".into()))?;
    assert_eq!(lease.queue(), queue);
    assert_eq!(lease.message().body, sent.body);
    assert_eq!(lease.message().content_type, sent.content_type);
    assert!(lease.message().persistent, "persistence should survive");
    assert_eq!(lease.headers().dlq_retry_count(), 3);
    assert_eq!(lease.headers().dlq_original_queue(), Some("payments"));
    lease.accept().await?;

    assert!(ch.get(&queue).await?.is_none(), "accepted message should be gone");
    ch.close().await?;
    Ok(())
}

async fn test_requeue(broker: &dyn Broker, prefix: &str) -> Result<(), BrokerError> {
    let queue = format!("{prefix}.requeue");
    let ch = broker.open_channel().await?;
    ch.declare_queue(&queue).await?;
    ch.publish(&queue, &message("again")).await?.await;

    let first = ch.get(&queue).await?;
    let first = first.ok_or_else(|| BrokerError::Channel("message missing".into()))?;
    first.requeue().await?;

    let second = ch.get(&queue).await?;
    let second = second.ok_or_else(|| BrokerError::Channel("requeued message missing".into()))?;
    assert_eq!(second.message().body, b"again");
    second.accept().await?;
    ch.close().await?;
    Ok(())
}

async fn test_close_releases_lease(broker: &dyn Broker, prefix: &str) -> Result<(), BrokerError> {
    let queue = format!("{prefix}.release");
    let ch = broker.open_channel().await?;
    ch.declare_queue(&queue).await?;
    ch.publish(&queue, &message("held")).await?.await;

    let held = ch.get(&queue).await?;
    let held = held.ok_or_else(|| BrokerError::Channel("message missing".into()))?;
    ch.close().await?;
    assert!(!ch.is_open(), "closed channel should report closed");
    assert!(held.accept().await.is_err(), "settling on a closed channel fails");

    let other = broker.open_channel().await?;
    let released = other.get(&queue).await?;
    let released =
        released.ok_or_else(|| BrokerError::Channel("released message missing".into()))?;
    assert_eq!(released.message().body, b"held");
    released.accept().await?;
    other.close().await?;
    Ok(())
}
