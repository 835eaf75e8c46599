// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! In-process broker with AMQP-like queue semantics.
//!
//! Queues live in one shared table. Deliveries are handed round robin to the
//! consumers of a queue, honoring the prefetch of manual-ack channels.
//! Failures can be injected per stage to exercise error paths
//! deterministically.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::{BrokerError, Channel, Connection, Delivery, MessageProperties, QueueOptions};

/// Broker operation that fails once after [`MemoryBroker::inject_fault`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    OpenChannel,
    DeclareQueue,
    SetPrefetch,
    Consume,
    Publish,
    Ack,
}

struct Message {
    properties: MessageProperties,
    body: Vec<u8>,
}

struct QueueConsumer {
    channel: u64,
    auto_ack: bool,
    tx: mpsc::UnboundedSender<Delivery>,
}

struct Queue {
    messages: VecDeque<Message>,
    consumers: Vec<QueueConsumer>,
    cursor: usize,
    owner: Option<u64>,
    auto_delete: bool,
    consumed: bool,
}

#[derive(Default)]
struct ChannelState {
    prefetch: u16,
    // delivery tag -> (queue, message)
    unacked: BTreeMap<u64, (String, Message)>,
}

impl ChannelState {
    fn has_capacity(&self) -> bool {
        self.prefetch == 0 || self.unacked.len() < self.prefetch as usize
    }
}

#[derive(Default)]
struct State {
    queues: HashMap<String, Queue>,
    channels: HashMap<u64, ChannelState>,
    next_channel: u64,
    next_tag: u64,
    next_name: u64,
    faults: Vec<Fault>,
    closed: bool,
}

impl State {
    fn take_fault(&mut self, fault: Fault) -> Result<(), BrokerError> {
        if let Some(pos) = self.faults.iter().position(|f| *f == fault) {
            self.faults.remove(pos);
            debug!(?fault, "injected broker failure");
            return Err(BrokerError::Injected(fault));
        }
        Ok(())
    }

    fn ensure_open(&self, channel: u64) -> Result<(), BrokerError> {
        if self.channels.contains_key(&channel) {
            Ok(())
        } else {
            Err(BrokerError::ChannelClosed)
        }
    }

    fn check_owner(&self, queue: &str, channel: u64) -> Result<(), BrokerError> {
        match self.queues.get(queue) {
            None => Err(BrokerError::QueueNotFound(queue.to_string())),
            Some(q) => match q.owner {
                Some(owner) if owner != channel => {
                    Err(BrokerError::ResourceLocked(queue.to_string()))
                }
                _ => Ok(()),
            },
        }
    }

    fn pump(&mut self, queue: &str) {
        let State {
            queues,
            channels,
            next_tag,
            ..
        } = self;

        let Some(q) = queues.get_mut(queue) else {
            return;
        };
        q.consumers.retain(|c| !c.tx.is_closed());

        while !q.messages.is_empty() && !q.consumers.is_empty() {
            let n = q.consumers.len();
            let picked = (0..n).map(|i| (q.cursor + i) % n).find(|&idx| {
                let c = &q.consumers[idx];
                c.auto_ack
                    || channels
                        .get(&c.channel)
                        .map(ChannelState::has_capacity)
                        .unwrap_or(false)
            });
            let Some(idx) = picked else {
                break;
            };
            let Some(message) = q.messages.pop_front() else {
                break;
            };

            *next_tag += 1;
            let tag = *next_tag;
            let (channel, auto_ack) = (q.consumers[idx].channel, q.consumers[idx].auto_ack);
            let delivery = Delivery {
                delivery_tag: tag,
                properties: message.properties.clone(),
                body: message.body.clone(),
            };

            if q.consumers[idx].tx.send(delivery).is_err() {
                q.messages.push_front(message);
                q.consumers.remove(idx);
                q.cursor = 0;
                continue;
            }
            q.cursor = (idx + 1) % n;

            if !auto_ack {
                if let Some(ch) = channels.get_mut(&channel) {
                    ch.unacked.insert(tag, (queue.to_string(), message));
                }
            }
        }
    }

    fn pump_all(&mut self) {
        let names: Vec<String> = self
            .queues
            .iter()
            .filter(|(_, q)| !q.messages.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        for name in names {
            self.pump(&name);
        }
    }

    fn close_channel(&mut self, id: u64) {
        let Some(ch) = self.channels.remove(&id) else {
            return;
        };

        for q in self.queues.values_mut() {
            q.consumers.retain(|c| c.channel != id);
        }

        let requeued = ch.unacked.len();
        for (_, (queue, message)) in ch.unacked.into_iter().rev() {
            if let Some(q) = self.queues.get_mut(&queue) {
                q.messages.push_front(message);
            }
        }

        self.queues.retain(|name, q| {
            let keep = q.owner != Some(id)
                && !(q.auto_delete && q.consumed && q.consumers.is_empty());
            if !keep {
                debug!(queue = %name, "queue deleted");
            }
            keep
        });

        debug!(channel = id, requeued, "channel closed");
        self.pump_all();
    }
}

/// Shared handle to an in-process broker. Clones refer to the same broker.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<State>>,
}

impl std::fmt::Debug for MemoryBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryBroker")
            .field("queues", &state.queues.len())
            .field("channels", &state.channels.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `fault` operation fail with [`BrokerError::Injected`].
    pub fn inject_fault(&self, fault: Fault) {
        self.state.lock().faults.push(fault);
    }

    pub fn queue_exists(&self, name: &str) -> bool {
        self.state.lock().queues.contains_key(name)
    }

    /// Number of messages ready for delivery on `name`.
    pub fn queue_len(&self, name: &str) -> usize {
        self.state
            .lock()
            .queues
            .get(name)
            .map(|q| q.messages.len())
            .unwrap_or(0)
    }

    pub fn consumer_count(&self, name: &str) -> usize {
        self.state
            .lock()
            .queues
            .get(name)
            .map(|q| q.consumers.iter().filter(|c| !c.tx.is_closed()).count())
            .unwrap_or(0)
    }

    pub fn queue_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().queues.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn open_channels(&self) -> usize {
        self.state.lock().channels.len()
    }
}

#[async_trait]
impl Connection for MemoryBroker {
    type Channel = MemoryChannel;

    async fn open_channel(&self) -> Result<MemoryChannel, BrokerError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(BrokerError::ConnectionClosed);
        }
        state.take_fault(Fault::OpenChannel)?;

        state.next_channel += 1;
        let id = state.next_channel;
        state.channels.insert(id, ChannelState::default());

        Ok(MemoryChannel {
            id,
            state: self.state.clone(),
        })
    }

    async fn close(&self) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        state.closed = true;
        let ids: Vec<u64> = state.channels.keys().copied().collect();
        for id in ids {
            state.close_channel(id);
        }
        Ok(())
    }
}

pub struct MemoryChannel {
    id: u64,
    state: Arc<Mutex<State>>,
}

impl Drop for MemoryChannel {
    fn drop(&mut self) {
        self.state.lock().close_channel(self.id);
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    type Consumer = MemoryConsumer;

    async fn declare_queue(
        &self,
        name: &str,
        options: QueueOptions,
    ) -> Result<String, BrokerError> {
        let mut state = self.state.lock();
        state.ensure_open(self.id)?;
        state.take_fault(Fault::DeclareQueue)?;

        let name = if name.is_empty() {
            state.next_name += 1;
            format!("amq.gen-{:08}", state.next_name)
        } else {
            name.to_string()
        };

        if state.queues.contains_key(&name) {
            state.check_owner(&name, self.id)?;
            return Ok(name);
        }

        state.queues.insert(
            name.clone(),
            Queue {
                messages: VecDeque::new(),
                consumers: Vec::new(),
                cursor: 0,
                owner: options.exclusive.then_some(self.id),
                auto_delete: options.auto_delete,
                consumed: false,
            },
        );
        debug!(queue = %name, ?options, "queue declared");

        Ok(name)
    }

    async fn set_prefetch(&self, count: u16) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        state.ensure_open(self.id)?;
        state.take_fault(Fault::SetPrefetch)?;

        if let Some(ch) = state.channels.get_mut(&self.id) {
            ch.prefetch = count;
        }
        state.pump_all();
        Ok(())
    }

    async fn consume(&self, queue: &str, auto_ack: bool) -> Result<MemoryConsumer, BrokerError> {
        let mut state = self.state.lock();
        state.ensure_open(self.id)?;
        state.take_fault(Fault::Consume)?;
        state.check_owner(queue, self.id)?;

        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(q) = state.queues.get_mut(queue) {
            q.consumers.push(QueueConsumer {
                channel: self.id,
                auto_ack,
                tx,
            });
            q.consumed = true;
        }
        state.pump(queue);

        Ok(MemoryConsumer { rx })
    }

    async fn publish(
        &self,
        routing_key: &str,
        properties: MessageProperties,
        body: Vec<u8>,
    ) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        state.ensure_open(self.id)?;
        state.take_fault(Fault::Publish)?;

        match state.queues.get_mut(routing_key) {
            Some(q) => {
                q.messages.push_back(Message { properties, body });
                state.pump(routing_key);
            }
            None => debug!(routing_key, "no queue for routing key, message dropped"),
        }
        Ok(())
    }

    async fn ack(&self, delivery_tag: u64) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        state.ensure_open(self.id)?;
        state.take_fault(Fault::Ack)?;

        let acked = state
            .channels
            .get_mut(&self.id)
            .and_then(|ch| ch.unacked.remove(&delivery_tag));
        if acked.is_none() {
            debug!(delivery_tag, "ack for unknown delivery tag");
        }
        state.pump_all();
        Ok(())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.state.lock().close_channel(self.id);
        Ok(())
    }
}

/// Stream of deliveries; ends when the owning channel closes.
pub struct MemoryConsumer {
    rx: mpsc::UnboundedReceiver<Delivery>,
}

impl Stream for MemoryConsumer {
    type Item = Result<Delivery, BrokerError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx).map(|d| d.map(Ok))
    }
}
