// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Broker primitives consumed by the RPC layer.
//!
//! A [`Connection`] hands out [`Channel`]s. Each channel can declare queues,
//! bound its unacknowledged deliveries, consume, publish to a queue through
//! the default exchange and acknowledge. Closing (or dropping) a channel
//! cancels its consumers, requeues what it left unacknowledged and deletes
//! the exclusive queues it declared.

#[cfg(feature = "amqp")]
pub mod amqp;
pub mod errors;
pub mod memory;

use async_trait::async_trait;
use futures::Stream;

pub use errors::BrokerError;
pub use memory::{Fault, MemoryBroker};

/// MIME type carried by every envelope.
pub const CONTENT_TYPE_JSON: &str = "application/json";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageProperties {
    pub correlation_id: Option<String>,
    pub reply_to: Option<String>,
    pub content_type: Option<String>,
}

impl MessageProperties {
    pub fn with_correlation_id(self, correlation_id: impl Into<String>) -> Self {
        MessageProperties {
            correlation_id: Some(correlation_id.into()),
            ..self
        }
    }

    pub fn with_reply_to(self, reply_to: impl Into<String>) -> Self {
        MessageProperties {
            reply_to: Some(reply_to.into()),
            ..self
        }
    }

    pub fn with_content_type(self, content_type: impl Into<String>) -> Self {
        MessageProperties {
            content_type: Some(content_type.into()),
            ..self
        }
    }
}

/// A message handed to a consumer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub delivery_tag: u64,
    pub properties: MessageProperties,
    pub body: Vec<u8>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueOptions {
    pub durable: bool,
    pub exclusive: bool,
    pub auto_delete: bool,
}

impl QueueOptions {
    /// Non-durable queue shared by every consumer, kept when unused.
    pub fn shared() -> Self {
        QueueOptions::default()
    }

    /// Queue private to the declaring channel, removed with it.
    pub fn private() -> Self {
        QueueOptions {
            durable: false,
            exclusive: true,
            auto_delete: true,
        }
    }
}

#[async_trait]
pub trait Channel: Send + Sync + 'static {
    type Consumer: Stream<Item = Result<Delivery, BrokerError>> + Send + Unpin + 'static;

    /// Declare `name`, or a server-named queue when `name` is empty.
    /// Returns the actual queue name.
    async fn declare_queue(&self, name: &str, options: QueueOptions)
    -> Result<String, BrokerError>;

    async fn set_prefetch(&self, count: u16) -> Result<(), BrokerError>;

    async fn consume(&self, queue: &str, auto_ack: bool) -> Result<Self::Consumer, BrokerError>;

    async fn publish(
        &self,
        routing_key: &str,
        properties: MessageProperties,
        body: Vec<u8>,
    ) -> Result<(), BrokerError>;

    async fn ack(&self, delivery_tag: u64) -> Result<(), BrokerError>;

    async fn close(&self) -> Result<(), BrokerError>;
}

#[async_trait]
pub trait Connection: Send + Sync + 'static {
    type Channel: Channel;

    async fn open_channel(&self) -> Result<Self::Channel, BrokerError>;

    async fn close(&self) -> Result<(), BrokerError>;
}
