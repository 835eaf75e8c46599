// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

use crate::memory::Fault;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("connection closed")]
    ConnectionClosed,
    #[error("channel closed")]
    ChannelClosed,
    #[error("queue {0} not found")]
    QueueNotFound(String),
    #[error("queue {0} is exclusive to another channel")]
    ResourceLocked(String),
    #[error("injected {0:?} failure")]
    Injected(Fault),

    #[cfg(feature = "amqp")]
    #[error("amqp error: {0}")]
    Amqp(#[from] lapin::Error),
}
