// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! AMQP 0.9.1 adapter over `lapin`.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
    QueueDeclareOptions,
};
use lapin::types::{FieldTable, ShortString};
use lapin::{BasicProperties, ConnectionProperties};
use tracing::debug;

use crate::{BrokerError, Channel, Connection, Delivery, MessageProperties, QueueOptions};

const REPLY_SUCCESS: u16 = 200;

pub struct AmqpConnection {
    inner: lapin::Connection,
}

impl AmqpConnection {
    pub async fn connect(url: &str) -> Result<Self, BrokerError> {
        let inner = lapin::Connection::connect(url, ConnectionProperties::default()).await?;
        debug!("connected to amqp broker");
        Ok(AmqpConnection { inner })
    }
}

#[async_trait]
impl Connection for AmqpConnection {
    type Channel = AmqpChannel;

    async fn open_channel(&self) -> Result<AmqpChannel, BrokerError> {
        let inner = self.inner.create_channel().await?;
        Ok(AmqpChannel { inner })
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.inner.close(REPLY_SUCCESS, "OK").await?;
        Ok(())
    }
}

pub struct AmqpChannel {
    inner: lapin::Channel,
}

fn from_amqp(props: &BasicProperties) -> MessageProperties {
    MessageProperties {
        correlation_id: props.correlation_id().as_ref().map(|s| s.to_string()),
        reply_to: props.reply_to().as_ref().map(|s| s.to_string()),
        content_type: props.content_type().as_ref().map(|s| s.to_string()),
    }
}

fn to_amqp(props: MessageProperties) -> BasicProperties {
    let mut out = BasicProperties::default();
    if let Some(id) = props.correlation_id {
        out = out.with_correlation_id(ShortString::from(id));
    }
    if let Some(reply_to) = props.reply_to {
        out = out.with_reply_to(ShortString::from(reply_to));
    }
    if let Some(content_type) = props.content_type {
        out = out.with_content_type(ShortString::from(content_type));
    }
    out
}

#[async_trait]
impl Channel for AmqpChannel {
    type Consumer = BoxStream<'static, Result<Delivery, BrokerError>>;

    async fn declare_queue(
        &self,
        name: &str,
        options: QueueOptions,
    ) -> Result<String, BrokerError> {
        let queue = self
            .inner
            .queue_declare(
                name,
                QueueDeclareOptions {
                    durable: options.durable,
                    exclusive: options.exclusive,
                    auto_delete: options.auto_delete,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(queue.name().to_string())
    }

    async fn set_prefetch(&self, count: u16) -> Result<(), BrokerError> {
        self.inner
            .basic_qos(count, BasicQosOptions::default())
            .await?;
        Ok(())
    }

    async fn consume(&self, queue: &str, auto_ack: bool) -> Result<Self::Consumer, BrokerError> {
        let consumer = self
            .inner
            .basic_consume(
                queue,
                "",
                BasicConsumeOptions {
                    no_ack: auto_ack,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await?;

        Ok(consumer
            .map(|res| {
                res.map(|d| Delivery {
                    delivery_tag: d.delivery_tag,
                    properties: from_amqp(&d.properties),
                    body: d.data,
                })
                .map_err(BrokerError::from)
            })
            .boxed())
    }

    async fn publish(
        &self,
        routing_key: &str,
        properties: MessageProperties,
        body: Vec<u8>,
    ) -> Result<(), BrokerError> {
        self.inner
            .basic_publish(
                "",
                routing_key,
                BasicPublishOptions::default(),
                &body,
                to_amqp(properties),
            )
            .await?
            .await?;
        Ok(())
    }

    async fn ack(&self, delivery_tag: u64) -> Result<(), BrokerError> {
        self.inner
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.inner.close(REPLY_SUCCESS, "OK").await?;
        Ok(())
    }
}
