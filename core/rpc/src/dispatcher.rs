// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Server side of the transport.
//!
//! A [`Dispatcher`] consumes the shared request queue with a set of workers,
//! each on its own channel with bounded prefetch. Every request is routed
//! through a [`Registry`] to the bot implementation, and the outcome is
//! published to the caller's reply queue before the request is
//! acknowledged.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use botrpc_broker::{CONTENT_TYPE_JSON, Channel, Connection, Delivery, MessageProperties, QueueOptions};
use botrpc_config::{Configuration, ServerConfig};

use crate::api::BotApi;
use crate::chattable::Chattable;
use crate::client::{CONTEXT_CONSUME, CONTEXT_DECLARE_QUEUE, CONTEXT_OPEN_CHANNEL};
use crate::configs::*;
use crate::envelope::{RequestEnvelope, ResponseEnvelope, Slots};
use crate::error::{DispatchError, RemoteError, RpcError};
use crate::operation::{Operation, slot};
use crate::types::*;

const CONTEXT_PREFETCH: &str = "failed to set QoS";

/// Future returned by a registered handler: the response slots, or the
/// error to send back.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Slots, RemoteError>> + Send>>;

/// Handler for one operation: decodes its slots, invokes the bot, encodes
/// the result.
pub type Handler<B> = Arc<dyn Fn(Arc<B>, Slots) -> HandlerFuture + Send + Sync>;

/// Receives the failures workers run into.
pub type ErrorHandler = Arc<dyn Fn(DispatchError) + Send + Sync>;

fn invalid_argument(err: impl std::fmt::Display) -> RemoteError {
    RemoteError::InvalidArgument(err.to_string())
}

fn encode_result<R: Serialize>(operation: Operation, result: &R) -> Result<Slots, RemoteError> {
    let Some(name) = operation.result_slot() else {
        return Ok(Slots::new());
    };
    Slots::new()
        .with(name, result)
        .map_err(|e| RemoteError::wrap("failed to encode result", RemoteError::message(e.to_string())))
}

/// Operation tag to handler table.
pub struct Registry<B> {
    handlers: HashMap<Operation, Handler<B>>,
}

impl<B> Default for Registry<B>
where
    B: BotApi + 'static,
    RemoteError: From<B::Error>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<B> Registry<B>
where
    B: BotApi + 'static,
    RemoteError: From<B::Error>,
{
    /// Registry without any handler.
    pub fn empty() -> Self {
        Registry {
            handlers: HashMap::new(),
        }
    }

    /// Registry routing every operation that can cross the broker to the
    /// matching [`BotApi`] method. `GetUpdatesChan` and `ListenForWebhook`
    /// stay unregistered and are answered as not implemented.
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register(Operation::MakeRequest, |bot: Arc<B>, mut slots| async move {
            let endpoint: String = slots.take(slot::ENDPOINT).map_err(invalid_argument)?;
            let params: Params = slots.take(slot::PARAMS).map_err(invalid_argument)?;
            let res = bot.make_request(endpoint, params).await?;
            encode_result(Operation::MakeRequest, &res)
        });
        registry.register(Operation::UploadFile, |bot: Arc<B>, mut slots| async move {
            let endpoint: String = slots.take(slot::ENDPOINT).map_err(invalid_argument)?;
            let params: FormFields = slots.take(slot::PARAMS).map_err(invalid_argument)?;
            let field_name: String = slots.take(slot::FIELD_NAME).map_err(invalid_argument)?;
            let file: FileSource = slots.take(slot::FILE).map_err(invalid_argument)?;
            let res = bot.upload_file(endpoint, params, field_name, file).await?;
            encode_result(Operation::UploadFile, &res)
        });

        registry.register_unary(Operation::GetFileDirectURL, slot::FILE_ID, |bot, id: String| async move {
            bot.get_file_direct_url(id).await
        });
        registry.register_nullary(Operation::GetMe, |bot| async move { bot.get_me().await });
        registry.register_unary(Operation::IsMessageToMe, slot::MESSAGE, |bot, m: Message| async move {
            Ok::<_, B::Error>(bot.is_message_to_me(m).await)
        });
        registry.register_unary(Operation::Send, slot::CHATTABLE, |bot, c: Chattable| async move {
            bot.send(c).await
        });
        registry.register_unary(
            Operation::GetUserProfilePhotos,
            slot::USER_PROFILE_PHOTOS_CONFIG,
            |bot, c: UserProfilePhotosConfig| async move { bot.get_user_profile_photos(c).await },
        );
        registry.register_unary(Operation::GetFile, slot::FILE_CONFIG, |bot, c: FileConfig| async move {
            bot.get_file(c).await
        });
        registry.register_unary(Operation::GetUpdates, slot::UPDATE_CONFIG, |bot, c: UpdateConfig| async move {
            bot.get_updates(c).await
        });
        registry.register_nullary(Operation::RemoveWebhook, |bot| async move {
            bot.remove_webhook().await
        });
        registry.register_unary(Operation::SetWebhook, slot::WEBHOOK_CONFIG, |bot, c: WebhookConfig| async move {
            bot.set_webhook(c).await
        });
        registry.register_nullary(Operation::GetWebhookInfo, |bot| async move {
            bot.get_webhook_info().await
        });
        registry.register_unary(Operation::AnswerInlineQuery, slot::INLINE_CONFIG, |bot, c: InlineConfig| async move {
            bot.answer_inline_query(c).await
        });
        registry.register_unary(
            Operation::AnswerCallbackQuery,
            slot::CALLBACK_CONFIG,
            |bot, c: CallbackConfig| async move { bot.answer_callback_query(c).await },
        );
        registry.register_unary(
            Operation::KickChatMember,
            slot::KICK_CHAT_MEMBER_CONFIG,
            |bot, c: KickChatMemberConfig| async move { bot.kick_chat_member(c).await },
        );
        registry.register_unary(Operation::LeaveChat, slot::CHAT_CONFIG, |bot, c: ChatConfig| async move {
            bot.leave_chat(c).await
        });
        registry.register_unary(Operation::GetChat, slot::CHAT_CONFIG, |bot, c: ChatConfig| async move {
            bot.get_chat(c).await
        });
        registry.register_unary(
            Operation::GetChatAdministrators,
            slot::CHAT_CONFIG,
            |bot, c: ChatConfig| async move { bot.get_chat_administrators(c).await },
        );
        registry.register_unary(
            Operation::GetChatMembersCount,
            slot::CHAT_CONFIG,
            |bot, c: ChatConfig| async move { bot.get_chat_members_count(c).await },
        );
        registry.register_unary(
            Operation::GetChatMember,
            slot::CHAT_CONFIG_WITH_USER,
            |bot, c: ChatConfigWithUser| async move { bot.get_chat_member(c).await },
        );
        registry.register_unary(
            Operation::UnbanChatMember,
            slot::CHAT_MEMBER_CONFIG,
            |bot, c: ChatMemberConfig| async move { bot.unban_chat_member(c).await },
        );
        registry.register_unary(
            Operation::RestrictChatMember,
            slot::RESTRICT_CHAT_MEMBER_CONFIG,
            |bot, c: RestrictChatMemberConfig| async move { bot.restrict_chat_member(c).await },
        );
        registry.register_unary(
            Operation::PromoteChatMember,
            slot::PROMOTE_CHAT_MEMBER_CONFIG,
            |bot, c: PromoteChatMemberConfig| async move { bot.promote_chat_member(c).await },
        );
        registry.register_unary(
            Operation::GetGameHighScores,
            slot::GET_GAME_HIGH_SCORES_CONFIG,
            |bot, c: GetGameHighScoresConfig| async move { bot.get_game_high_scores(c).await },
        );
        registry.register_unary(
            Operation::AnswerShippingQuery,
            slot::SHIPPING_CONFIG,
            |bot, c: ShippingConfig| async move { bot.answer_shipping_query(c).await },
        );
        registry.register_unary(
            Operation::AnswerPreCheckoutQuery,
            slot::PRE_CHECKOUT_CONFIG,
            |bot, c: PreCheckoutConfig| async move { bot.answer_pre_checkout_query(c).await },
        );
        registry.register_unary(
            Operation::DeleteMessage,
            slot::DELETE_MESSAGE_CONFIG,
            |bot, c: DeleteMessageConfig| async move { bot.delete_message(c).await },
        );
        registry.register_unary(Operation::GetInviteLink, slot::CHAT_CONFIG, |bot, c: ChatConfig| async move {
            bot.get_invite_link(c).await
        });
        registry.register_unary(
            Operation::PinChatMessage,
            slot::PIN_CHAT_MESSAGE_CONFIG,
            |bot, c: PinChatMessageConfig| async move { bot.pin_chat_message(c).await },
        );
        registry.register_unary(
            Operation::UnpinChatMessage,
            slot::UNPIN_CHAT_MESSAGE_CONFIG,
            |bot, c: UnpinChatMessageConfig| async move { bot.unpin_chat_message(c).await },
        );
        registry.register_unary(
            Operation::SetChatTitle,
            slot::SET_CHAT_TITLE_CONFIG,
            |bot, c: SetChatTitleConfig| async move { bot.set_chat_title(c).await },
        );
        registry.register_unary(
            Operation::SetChatDescription,
            slot::SET_CHAT_DESCRIPTION_CONFIG,
            |bot, c: SetChatDescriptionConfig| async move { bot.set_chat_description(c).await },
        );
        registry.register_unary(
            Operation::SetChatPhoto,
            slot::SET_CHAT_PHOTO_CONFIG,
            |bot, c: SetChatPhotoConfig| async move { bot.set_chat_photo(c).await },
        );
        registry.register_unary(
            Operation::DeleteChatPhoto,
            slot::DELETE_CHAT_PHOTO_CONFIG,
            |bot, c: DeleteChatPhotoConfig| async move { bot.delete_chat_photo(c).await },
        );

        registry
    }

    /// Register a raw handler, replacing any previous one for `operation`.
    pub fn register<F, Fut>(&mut self, operation: Operation, handler: F)
    where
        F: Fn(Arc<B>, Slots) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Slots, RemoteError>> + Send + 'static,
    {
        let wrapper: Handler<B> =
            Arc::new(move |bot: Arc<B>, slots: Slots| Box::pin(handler(bot, slots)) as HandlerFuture);
        self.handlers.insert(operation, wrapper);
    }

    /// Register a handler taking one argument from the slot `arg` and
    /// answering in the operation's result slot.
    pub fn register_unary<A, R, F, Fut>(&mut self, operation: Operation, arg: &'static str, handler: F)
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(Arc<B>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, B::Error>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        self.register(operation, move |bot: Arc<B>, mut slots: Slots| {
            let handler = Arc::clone(&handler);
            async move {
                let request: A = slots.take(arg).map_err(invalid_argument)?;
                let response = handler(bot, request).await?;
                encode_result(operation, &response)
            }
        });
    }

    /// Register a handler for an operation without arguments.
    pub fn register_nullary<R, F, Fut>(&mut self, operation: Operation, handler: F)
    where
        R: Serialize + Send + 'static,
        F: Fn(Arc<B>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, B::Error>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        self.register(operation, move |bot: Arc<B>, _slots: Slots| {
            let handler = Arc::clone(&handler);
            async move {
                let response = handler(bot).await?;
                encode_result(operation, &response)
            }
        });
    }

    pub fn unregister(&mut self, operation: Operation) -> bool {
        self.handlers.remove(&operation).is_some()
    }

    pub fn get(&self, operation: Operation) -> Option<Handler<B>> {
        self.handlers.get(&operation).cloned()
    }

    /// Registered operations, in declaration order.
    pub fn operations(&self) -> Vec<Operation> {
        let mut ops: Vec<Operation> = self.handlers.keys().copied().collect();
        ops.sort();
        ops
    }
}

struct DispatcherInner<C: Connection, B> {
    connection: Arc<C>,
    bot: Arc<B>,
    registry: Registry<B>,
    config: ServerConfig,
    error_handler: RwLock<ErrorHandler>,
    drain_signal: RwLock<Option<drain::Signal>>,
    drain_watch: RwLock<Option<drain::Watch>>,
}

/// Serves a [`BotApi`] implementation on the shared request queue.
pub struct Dispatcher<C: Connection, B> {
    inner: Arc<DispatcherInner<C, B>>,
}

impl<C: Connection, B> Clone for Dispatcher<C, B> {
    fn clone(&self) -> Self {
        Dispatcher {
            inner: self.inner.clone(),
        }
    }
}

enum Outcome {
    Done,
    // the channel is unusable, reopen it
    Reconnect,
}

impl<C, B> Dispatcher<C, B>
where
    C: Connection,
    B: BotApi + 'static,
    RemoteError: From<B::Error>,
{
    pub fn new(connection: Arc<C>, bot: Arc<B>, config: ServerConfig) -> Self {
        Self::with_registry(connection, bot, config, Registry::new())
    }

    pub fn with_registry(
        connection: Arc<C>,
        bot: Arc<B>,
        config: ServerConfig,
        registry: Registry<B>,
    ) -> Self {
        let (drain_signal, drain_watch) = drain::channel();
        let error_handler: ErrorHandler = Arc::new(|e: DispatchError| {
            error!(error = %e, "dispatch error");
        });

        Dispatcher {
            inner: Arc::new(DispatcherInner {
                connection,
                bot,
                registry,
                config,
                error_handler: RwLock::new(error_handler),
                drain_signal: RwLock::new(Some(drain_signal)),
                drain_watch: RwLock::new(Some(drain_watch)),
            }),
        }
    }

    /// Replace the error handler. The default one logs at error level.
    pub fn set_error_handler<F>(&self, handler: F)
    where
        F: Fn(DispatchError) + Send + Sync + 'static,
    {
        *self.inner.error_handler.write() = Arc::new(handler);
    }

    pub fn registry(&self) -> &Registry<B> {
        &self.inner.registry
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    fn report(&self, err: DispatchError) {
        let handler = self.inner.error_handler.read().clone();
        handler(err);
    }

    /// Declare the request queue, start the workers and serve until
    /// [`Dispatcher::shutdown`] drains them. An invalid configuration, or
    /// failing to set up the queue or any worker, is returned as an error.
    pub async fn serve(&self) -> Result<(), RpcError> {
        self.inner.config.validate()?;

        let Some(watch) = self.inner.drain_watch.read().clone() else {
            info!("dispatcher is shutting down, not serving");
            return Ok(());
        };

        let queue = self.inner.config.request_queue().to_string();
        info!(
            %queue,
            workers = self.inner.config.workers(),
            prefetch = self.inner.config.prefetch(),
            "dispatcher starting"
        );

        let setup = self
            .inner
            .connection
            .open_channel()
            .await
            .map_err(|e| RpcError::transport(CONTEXT_OPEN_CHANNEL, e))?;
        setup
            .declare_queue(&queue, QueueOptions::shared())
            .await
            .map_err(|e| RpcError::transport(CONTEXT_DECLARE_QUEUE, e))?;
        if let Err(e) = setup.close().await {
            debug!(error = %e, "failed to close setup channel");
        }

        let mut workers = Vec::with_capacity(self.inner.config.workers());
        for _ in 0..self.inner.config.workers() {
            workers.push(self.open_worker().await?);
        }

        let handles: Vec<_> = workers
            .into_iter()
            .enumerate()
            .map(|(id, (channel, consumer))| {
                let dispatcher = self.clone();
                let watch = watch.clone();
                tokio::spawn(async move { dispatcher.run_worker(id, channel, consumer, watch).await })
            })
            .collect();

        // workers hold their own watch, shutdown must not wait on this one
        drop(watch);

        for handle in futures::future::join_all(handles).await {
            if let Err(e) = handle {
                error!(error = %e, "dispatcher worker panicked");
            }
        }

        info!(%queue, "dispatcher stopped");
        Ok(())
    }

    /// Serve until SIGINT/SIGTERM, then drain the workers.
    pub async fn serve_until_signal(&self) -> Result<(), RpcError> {
        let serving = self.serve();
        tokio::pin!(serving);

        tokio::select! {
            res = &mut serving => return res,
            _ = botrpc_signal::shutdown() => {}
        }

        self.shutdown().await;
        serving.await
    }

    /// Stop every worker once its current delivery is answered. Waits at
    /// most the configured drain timeout. The dispatcher can serve again
    /// afterwards.
    pub async fn shutdown(&self) {
        info!("shutting down dispatcher");

        let drain_signal = self.inner.drain_signal.write().take();
        let drain_watch = self.inner.drain_watch.write().take();
        drop(drain_watch);

        if let Some(signal) = drain_signal {
            let timeout = self.inner.config.drain_timeout();
            match tokio::time::timeout(timeout, signal.drain()).await {
                Ok(()) => info!("all workers drained"),
                Err(_) => warn!(?timeout, "timeout waiting for workers to drain"),
            }
        }

        let (new_signal, new_watch) = drain::channel();
        *self.inner.drain_signal.write() = Some(new_signal);
        *self.inner.drain_watch.write() = Some(new_watch);
    }

    async fn open_worker(&self) -> Result<(C::Channel, <C::Channel as Channel>::Consumer), RpcError> {
        let channel = self
            .inner
            .connection
            .open_channel()
            .await
            .map_err(|e| RpcError::transport(CONTEXT_OPEN_CHANNEL, e))?;
        channel
            .set_prefetch(self.inner.config.prefetch())
            .await
            .map_err(|e| RpcError::transport(CONTEXT_PREFETCH, e))?;
        let consumer = channel
            .consume(self.inner.config.request_queue(), false)
            .await
            .map_err(|e| RpcError::transport(CONTEXT_CONSUME, e))?;
        Ok((channel, consumer))
    }

    async fn run_worker(
        self,
        id: usize,
        mut channel: C::Channel,
        mut consumer: <C::Channel as Channel>::Consumer,
        watch: drain::Watch,
    ) {
        debug!(worker = id, "worker started");

        loop {
            let outcome = tokio::select! {
                _ = watch.clone().signaled() => {
                    debug!(worker = id, "worker draining");
                    break;
                }
                next = consumer.next() => match next {
                    Some(Ok(delivery)) => self.process(&channel, delivery).await,
                    Some(Err(e)) => {
                        self.report(DispatchError::Consumer(e));
                        Outcome::Reconnect
                    }
                    None => {
                        self.report(DispatchError::Consumer(botrpc_broker::BrokerError::ChannelClosed));
                        Outcome::Reconnect
                    }
                },
            };

            if let Outcome::Done = outcome {
                continue;
            }

            // dropping the channel hands unacknowledged deliveries back
            if let Err(e) = channel.close().await {
                debug!(worker = id, error = %e, "failed to close worker channel");
            }

            match self.reconnect(id, &watch).await {
                Some((ch, co)) => {
                    channel = ch;
                    consumer = co;
                }
                None => return,
            }
        }

        if let Err(e) = channel.close().await {
            debug!(worker = id, error = %e, "failed to close worker channel");
        }
        debug!(worker = id, "worker stopped");
    }

    async fn reconnect(
        &self,
        id: usize,
        watch: &drain::Watch,
    ) -> Option<(C::Channel, <C::Channel as Channel>::Consumer)> {
        loop {
            tokio::select! {
                _ = watch.clone().signaled() => return None,
                _ = tokio::time::sleep(self.inner.config.reconnect_interval()) => {}
            }

            match self.open_worker().await {
                Ok(worker) => {
                    info!(worker = id, "worker channel reopened");
                    return Some(worker);
                }
                Err(e) => self.report(DispatchError::Reconnect(e)),
            }
        }
    }

    async fn process(&self, channel: &C::Channel, delivery: Delivery) -> Outcome {
        let Delivery {
            delivery_tag,
            properties,
            body,
        } = delivery;

        let response = match RequestEnvelope::decode(&body) {
            Ok(request) => Some(self.handle(request).await),
            Err(e) => {
                let reason = e.to_string();
                self.report(DispatchError::Decode(e));
                properties.correlation_id.as_ref().map(|id| {
                    ResponseEnvelope::failure("", id.as_str(), &RemoteError::InvalidArgument(reason))
                })
            }
        };

        if let Some(response) = response {
            match properties.reply_to.as_deref() {
                Some(reply_to) => match response.encode() {
                    Ok(bytes) => {
                        let correlation_id = properties
                            .correlation_id
                            .clone()
                            .unwrap_or_else(|| response.correlation_id.clone());
                        let reply = MessageProperties::default()
                            .with_correlation_id(correlation_id)
                            .with_content_type(CONTENT_TYPE_JSON);

                        if let Err(e) = channel.publish(reply_to, reply, bytes).await {
                            self.report(DispatchError::Publish(e));
                            return Outcome::Reconnect;
                        }
                        debug!(
                            operation = %response.operation,
                            correlation_id = %response.correlation_id,
                            failed = response.error.is_some(),
                            "response published"
                        );
                    }
                    Err(source) => self.report(DispatchError::Encode {
                        operation: response.operation.clone(),
                        source,
                    }),
                },
                None => self.report(DispatchError::NoReplyTo { delivery_tag }),
            }
        }

        if let Err(source) = channel.ack(delivery_tag).await {
            self.report(DispatchError::Ack {
                delivery_tag,
                source,
            });
            return Outcome::Reconnect;
        }

        Outcome::Done
    }

    async fn handle(&self, request: RequestEnvelope) -> ResponseEnvelope {
        let outcome = match request.operation() {
            Ok(operation) => match self.inner.registry.get(operation) {
                // a panicking bot only fails its own request
                Some(handler) => {
                    let task = tokio::spawn(handler(self.inner.bot.clone(), request.slots));
                    match task.await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            warn!(operation = %request.operation, error = %e, "handler task failed");
                            Err(RemoteError::wrap(
                                "handler panicked",
                                RemoteError::message(e.to_string()),
                            ))
                        }
                    }
                }
                None => Err(RemoteError::NotImplemented(request.operation.clone())),
            },
            Err(_) => Err(RemoteError::NotImplemented(request.operation.clone())),
        };

        match outcome {
            Ok(slots) => ResponseEnvelope::success(request.operation, request.correlation_id, slots),
            Err(e) => {
                debug!(operation = %request.operation, error = %e, "operation failed");
                ResponseEnvelope::failure(request.operation, request.correlation_id, &e)
            }
        }
    }
}
