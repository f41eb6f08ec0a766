use async_trait::async_trait;
use futures::FutureExt;
use lapin::acker::Acker;
use lapin::options::{
    BasicAckOptions, BasicGetOptions, BasicPublishOptions, BasicQosOptions, BasicRejectOptions,
    ConfirmSelectOptions, QueueDeclareOptions,
};
use lapin::types::{FieldTable, ShortString};
use lapin::{BasicProperties, Channel};
use tracing::debug;

use lazarus_broker::{
    Acknowledger, BrokerChannel, BrokerError, Confirmation, Lease, PendingConfirm,
};
use lazarus_core::Message;

use crate::headers::{headers_from_table, headers_to_table};

/// AMQP delivery mode for messages written to disk.
const PERSISTENT: u8 = 2;

/// A single AMQP channel.
pub struct AmqpChannel {
    channel: Channel,
}

impl AmqpChannel {
    pub(crate) fn new(channel: Channel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl BrokerChannel for AmqpChannel {
    async fn declare_queue(&self, queue: &str) -> Result<(), BrokerError> {
        let options = QueueDeclareOptions {
            durable: true,
            ..QueueDeclareOptions::default()
        };
        self.channel
            .queue_declare(queue, options, FieldTable::default())
            .await
            .map(|_| ())
            .map_err(|e| BrokerError::Declare {
                queue: queue.to_owned(),
                reason: e.to_string(),
            })
    }

    async fn set_prefetch(&self, count: u16) -> Result<(), BrokerError> {
        self.channel
            .basic_qos(count, BasicQosOptions::default())
            .await
            .map_err(|e| BrokerError::Channel(e.to_string()))
    }

    async fn get(&self, queue: &str) -> Result<Option<Lease>, BrokerError> {
        let fetched = self
            .channel
            .basic_get(queue, BasicGetOptions::default())
            .await
            .map_err(|e| BrokerError::Channel(e.to_string()))?;

        let Some(fetched) = fetched else {
            return Ok(None);
        };
        let delivery = fetched.delivery;
        let properties = &delivery.properties;

        let message = Message {
            headers: headers_from_table(properties.headers().as_ref()),
            content_type: properties
                .content_type()
                .as_ref()
                .map(|ct| ct.as_str().to_owned()),
            persistent: properties.delivery_mode().is_some_and(|m| m == PERSISTENT),
            body: delivery.data,
        };
        debug!(
            queue,
            delivery_tag = delivery.delivery_tag,
            redelivered = delivery.redelivered,
            "fetched message"
        );

        let acker = AmqpAcker {
            acker: delivery.acker,
        };
        Ok(Some(Lease::new(
            queue,
            delivery.delivery_tag,
            message,
            Box::new(acker),
        )))
    }

    async fn enable_confirms(&self) -> Result<(), BrokerError> {
        self.channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| BrokerError::Channel(e.to_string()))
    }

    async fn publish(&self, queue: &str, message: &Message) -> Result<PendingConfirm, BrokerError> {
        let mut properties =
            BasicProperties::default().with_headers(headers_to_table(&message.headers));
        if let Some(ref content_type) = message.content_type {
            properties = properties.with_content_type(ShortString::from(content_type.as_str()));
        }
        if message.persistent {
            properties = properties.with_delivery_mode(PERSISTENT);
        }

        let confirm = self
            .channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &message.body,
                properties,
            )
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?;

        Ok(async move {
            match confirm.await {
                Ok(c) if c.is_nack() => Confirmation::Nack,
                // `NotRequested` only happens without confirm mode, where the
                // broker has nothing further to say.
                Ok(_) => Confirmation::Ack,
                Err(e) => {
                    debug!(error = %e, "publisher confirm channel closed");
                    Confirmation::Closed
                }
            }
        }
        .boxed())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        if !self.channel.status().connected() {
            return Ok(());
        }
        self.channel
            .close(200, "OK")
            .await
            .map_err(|e| BrokerError::Channel(e.to_string()))
    }

    fn is_open(&self) -> bool {
        self.channel.status().connected()
    }
}

struct AmqpAcker {
    acker: Acker,
}

#[async_trait]
impl Acknowledger for AmqpAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        self.acker
            .ack(BasicAckOptions::default())
            .await
            .map_err(|e| BrokerError::Acknowledge(e.to_string()))
    }

    async fn reject(&self, requeue: bool) -> Result<(), BrokerError> {
        self.acker
            .reject(BasicRejectOptions { requeue })
            .await
            .map_err(|e| BrokerError::Acknowledge(e.to_string()))
    }
}
