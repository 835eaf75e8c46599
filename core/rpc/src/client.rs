// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Client side of the transport.
//!
//! Every call opens its own channel and an exclusive, server-named reply
//! queue, publishes the request to the shared request queue and waits for
//! the reply carrying its correlation id. Publishing and waiting run as one
//! future bounded by the call timeout. The channel, and the reply queue
//! with it, is closed whatever the outcome.

use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt, future};
use rand::Rng;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{Instrument, debug, debug_span, warn};

use botrpc_broker::{
    BrokerError, CONTENT_TYPE_JSON, Channel, Connection, Delivery, MessageProperties,
    QueueOptions,
};
use botrpc_config::ClientConfig;

use crate::api::BotApi;
use crate::chattable::Chattable;
use crate::configs::*;
use crate::envelope::{RequestEnvelope, ResponseEnvelope, Slots};
use crate::error::RpcError;
use crate::operation::{Operation, slot};
use crate::types::*;

pub const CORRELATION_ID_LEN: usize = 32;

pub const CONTEXT_CONNECT: &str = "failed to connect to the broker";
pub const CONTEXT_OPEN_CHANNEL: &str = "failed to open a channel";
pub const CONTEXT_DECLARE_QUEUE: &str = "failed to declare a queue";
pub const CONTEXT_CONSUME: &str = "failed to register a consumer";
pub const CONTEXT_PUBLISH: &str = "failed to publish a message";
pub const CONTEXT_REPLY_CLOSED: &str = "reply consumer closed";
pub const CONTEXT_CLOSE: &str = "failed to close the connection";

/// Fresh correlation id: uppercase ASCII letters.
pub fn correlation_id() -> String {
    let mut rng = rand::rng();
    (0..CORRELATION_ID_LEN)
        .map(|_| char::from(rng.random_range(b'A'..b'Z')))
        .collect()
}

/// Lifecycle of a single call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallState {
    Idle,
    AwaitingReply,
    Completed,
    TimedOut,
    DispatchFailed,
}

impl CallState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallState::Idle => "idle",
            CallState::AwaitingReply => "awaiting_reply",
            CallState::Completed => "completed",
            CallState::TimedOut => "timed_out",
            CallState::DispatchFailed => "dispatch_failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CallState::Completed | CallState::TimedOut | CallState::DispatchFailed
        )
    }

    /// Terminal state reached by a finished exchange.
    pub fn of<T>(outcome: &Result<T, RpcError>) -> Self {
        match outcome {
            Ok(_) | Err(RpcError::Decode(_)) | Err(RpcError::Remote(_)) => CallState::Completed,
            Err(RpcError::Timeout(_)) => CallState::TimedOut,
            Err(RpcError::Transport { .. })
            | Err(RpcError::Encode(_))
            | Err(RpcError::Config(_)) => {
                CallState::DispatchFailed
            }
        }
    }
}

/// Bot API proxy that forwards every call over the broker.
pub struct RemoteBot<C: Connection> {
    connection: Arc<C>,
    config: ClientConfig,
}

impl<C: Connection> Clone for RemoteBot<C> {
    fn clone(&self) -> Self {
        RemoteBot {
            connection: self.connection.clone(),
            config: self.config.clone(),
        }
    }
}

impl<C: Connection> std::fmt::Debug for RemoteBot<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteBot")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(feature = "amqp")]
impl RemoteBot<botrpc_broker::amqp::AmqpConnection> {
    /// Connect to the AMQP broker described by `broker`.
    pub async fn connect(
        broker: &botrpc_config::BrokerConfig,
        config: ClientConfig,
    ) -> Result<Self, RpcError> {
        let connection = botrpc_broker::amqp::AmqpConnection::connect(broker.url())
            .await
            .map_err(|e| RpcError::transport(CONTEXT_CONNECT, e))?;
        Ok(Self::new(Arc::new(connection), config))
    }
}

impl<C: Connection> RemoteBot<C> {
    pub fn new(connection: Arc<C>, config: ClientConfig) -> Self {
        RemoteBot { connection, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Close the shared broker connection. Clones stop working too.
    pub async fn close(&self) -> Result<(), RpcError> {
        self.connection
            .close()
            .await
            .map_err(|e| RpcError::transport(CONTEXT_CLOSE, e))
    }

    /// Stream of updates, long polling `GetUpdates` and moving the offset
    /// past every update seen. Failed polls, and empty short polls, are
    /// retried after the configured poll interval. Dropping the stream stops
    /// polling.
    pub fn updates(&self, config: UpdateConfig) -> impl Stream<Item = Update> + Send + 'static {
        let bot = self.clone();
        stream! {
            let mut config = config;
            loop {
                match bot.get_updates(config.clone()).await {
                    Ok(updates) if updates.is_empty() => {
                        if config.timeout <= 0 {
                            tokio::time::sleep(bot.config.poll_interval()).await;
                        }
                    }
                    Ok(updates) => {
                        for update in updates {
                            if update.update_id >= config.offset {
                                config.offset = update.update_id + 1;
                                yield update;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to get updates, retrying");
                        tokio::time::sleep(bot.config.poll_interval()).await;
                    }
                }
            }
        }
    }

    async fn call<R: DeserializeOwned>(
        &self,
        operation: Operation,
        slots: Slots,
    ) -> Result<R, RpcError> {
        self.call_within(operation, slots, self.config.timeout()).await
    }

    async fn call_within<R: DeserializeOwned>(
        &self,
        operation: Operation,
        slots: Slots,
        timeout: Duration,
    ) -> Result<R, RpcError> {
        let response = self.invoke(operation, slots, timeout).await?;
        Ok(response.into_result(operation)??)
    }

    /// Single-argument call.
    async fn call_with<A: Serialize, R: DeserializeOwned>(
        &self,
        operation: Operation,
        name: &str,
        arg: &A,
    ) -> Result<R, RpcError> {
        let slots = Slots::new().with(name, arg)?;
        self.call(operation, slots).await
    }

    async fn invoke(
        &self,
        operation: Operation,
        slots: Slots,
        timeout: Duration,
    ) -> Result<ResponseEnvelope, RpcError> {
        let correlation_id = correlation_id();
        let span = debug_span!(
            "rpc_call",
            %operation,
            correlation_id = %correlation_id,
            state = CallState::Idle.as_str()
        );

        let body = RequestEnvelope::new(operation, correlation_id.as_str(), slots).encode()?;

        let outcome = async {
            let channel = self
                .connection
                .open_channel()
                .await
                .map_err(|e| RpcError::transport(CONTEXT_OPEN_CHANNEL, e))?;

            let outcome = self.exchange(&channel, &correlation_id, body, timeout).await;

            if let Err(e) = channel.close().await {
                debug!(error = %e, "failed to close call channel");
            }
            outcome
        }
        .instrument(span.clone())
        .await;

        let state = CallState::of(&outcome);
        span.record("state", state.as_str());
        span.in_scope(|| debug!(state = state.as_str(), "call finished"));

        outcome
    }

    async fn exchange(
        &self,
        channel: &C::Channel,
        correlation_id: &str,
        body: Vec<u8>,
        timeout: Duration,
    ) -> Result<ResponseEnvelope, RpcError> {
        let reply_queue = channel
            .declare_queue("", QueueOptions::private())
            .await
            .map_err(|e| RpcError::transport(CONTEXT_DECLARE_QUEUE, e))?;

        let mut replies = channel
            .consume(&reply_queue, true)
            .await
            .map_err(|e| RpcError::transport(CONTEXT_CONSUME, e))?;

        let properties = MessageProperties::default()
            .with_correlation_id(correlation_id)
            .with_reply_to(reply_queue.as_str())
            .with_content_type(CONTENT_TYPE_JSON);

        let publish = async {
            channel
                .publish(self.config.request_queue(), properties, body)
                .await
                .map_err(|e| RpcError::transport(CONTEXT_PUBLISH, e))?;
            debug!(
                state = CallState::AwaitingReply.as_str(),
                reply_to = %reply_queue,
                "request published"
            );
            Ok::<(), RpcError>(())
        };

        match tokio::time::timeout(
            timeout,
            future::try_join(publish, await_reply(&mut replies, correlation_id)),
        )
        .await
        {
            Ok(res) => res.map(|((), response)| response),
            Err(_) => Err(RpcError::Timeout(timeout)),
        }
    }
}

async fn await_reply<S>(replies: &mut S, correlation_id: &str) -> Result<ResponseEnvelope, RpcError>
where
    S: Stream<Item = Result<Delivery, BrokerError>> + Unpin,
{
    while let Some(delivery) = replies.next().await {
        let delivery = delivery.map_err(|e| RpcError::transport(CONTEXT_CONSUME, e))?;
        if delivery.properties.correlation_id.as_deref() != Some(correlation_id) {
            debug!(
                received = ?delivery.properties.correlation_id,
                "discarding reply for another call"
            );
            continue;
        }
        return Ok(ResponseEnvelope::decode(&delivery.body)?);
    }

    Err(RpcError::transport(
        CONTEXT_REPLY_CLOSED,
        BrokerError::ChannelClosed,
    ))
}

#[async_trait]
impl<C: Connection> BotApi for RemoteBot<C> {
    type Error = RpcError;

    async fn make_request(&self, endpoint: String, params: Params) -> Result<ApiResponse, RpcError> {
        let slots = Slots::new()
            .with(slot::ENDPOINT, &endpoint)?
            .with(slot::PARAMS, &params)?;
        self.call(Operation::MakeRequest, slots).await
    }

    async fn upload_file(
        &self,
        endpoint: String,
        params: FormFields,
        field_name: String,
        file: FileSource,
    ) -> Result<ApiResponse, RpcError> {
        let slots = Slots::new()
            .with(slot::ENDPOINT, &endpoint)?
            .with(slot::PARAMS, &params)?
            .with(slot::FIELD_NAME, &field_name)?
            .with(slot::FILE, &file)?;
        self.call(Operation::UploadFile, slots).await
    }

    async fn get_file_direct_url(&self, file_id: String) -> Result<String, RpcError> {
        self.call_with(Operation::GetFileDirectURL, slot::FILE_ID, &file_id)
            .await
    }

    async fn get_me(&self) -> Result<User, RpcError> {
        self.call(Operation::GetMe, Slots::new()).await
    }

    async fn is_message_to_me(&self, message: Message) -> bool {
        match self
            .call_with::<_, bool>(Operation::IsMessageToMe, slot::MESSAGE, &message)
            .await
        {
            Ok(to_me) => to_me,
            Err(e) => {
                warn!(error = %e, "IsMessageToMe failed, answering false");
                false
            }
        }
    }

    async fn send(&self, chattable: Chattable) -> Result<Message, RpcError> {
        self.call_with(Operation::Send, slot::CHATTABLE, &chattable)
            .await
    }

    async fn get_user_profile_photos(
        &self,
        config: UserProfilePhotosConfig,
    ) -> Result<UserProfilePhotos, RpcError> {
        self.call_with(
            Operation::GetUserProfilePhotos,
            slot::USER_PROFILE_PHOTOS_CONFIG,
            &config,
        )
        .await
    }

    async fn get_file(&self, config: FileConfig) -> Result<File, RpcError> {
        self.call_with(Operation::GetFile, slot::FILE_CONFIG, &config)
            .await
    }

    async fn get_updates(&self, config: UpdateConfig) -> Result<Vec<Update>, RpcError> {
        // the server may hold a long poll for up to config.timeout seconds
        let long_poll = Duration::from_secs(config.timeout.max(0) as u64);
        let slots = Slots::new().with(slot::UPDATE_CONFIG, &config)?;
        self.call_within(Operation::GetUpdates, slots, self.config.timeout() + long_poll)
            .await
    }

    async fn remove_webhook(&self) -> Result<ApiResponse, RpcError> {
        self.call(Operation::RemoveWebhook, Slots::new()).await
    }

    async fn set_webhook(&self, config: WebhookConfig) -> Result<ApiResponse, RpcError> {
        self.call_with(Operation::SetWebhook, slot::WEBHOOK_CONFIG, &config)
            .await
    }

    async fn get_webhook_info(&self) -> Result<WebhookInfo, RpcError> {
        self.call(Operation::GetWebhookInfo, Slots::new()).await
    }

    async fn answer_inline_query(&self, config: InlineConfig) -> Result<ApiResponse, RpcError> {
        self.call_with(Operation::AnswerInlineQuery, slot::INLINE_CONFIG, &config)
            .await
    }

    async fn answer_callback_query(&self, config: CallbackConfig) -> Result<ApiResponse, RpcError> {
        self.call_with(Operation::AnswerCallbackQuery, slot::CALLBACK_CONFIG, &config)
            .await
    }

    async fn kick_chat_member(&self, config: KickChatMemberConfig) -> Result<ApiResponse, RpcError> {
        self.call_with(
            Operation::KickChatMember,
            slot::KICK_CHAT_MEMBER_CONFIG,
            &config,
        )
        .await
    }

    async fn leave_chat(&self, config: ChatConfig) -> Result<ApiResponse, RpcError> {
        self.call_with(Operation::LeaveChat, slot::CHAT_CONFIG, &config)
            .await
    }

    async fn get_chat(&self, config: ChatConfig) -> Result<Chat, RpcError> {
        self.call_with(Operation::GetChat, slot::CHAT_CONFIG, &config)
            .await
    }

    async fn get_chat_administrators(&self, config: ChatConfig) -> Result<Vec<ChatMember>, RpcError> {
        self.call_with(Operation::GetChatAdministrators, slot::CHAT_CONFIG, &config)
            .await
    }

    async fn get_chat_members_count(&self, config: ChatConfig) -> Result<i64, RpcError> {
        self.call_with(Operation::GetChatMembersCount, slot::CHAT_CONFIG, &config)
            .await
    }

    async fn get_chat_member(&self, config: ChatConfigWithUser) -> Result<ChatMember, RpcError> {
        self.call_with(Operation::GetChatMember, slot::CHAT_CONFIG_WITH_USER, &config)
            .await
    }

    async fn unban_chat_member(&self, config: ChatMemberConfig) -> Result<ApiResponse, RpcError> {
        self.call_with(Operation::UnbanChatMember, slot::CHAT_MEMBER_CONFIG, &config)
            .await
    }

    async fn restrict_chat_member(
        &self,
        config: RestrictChatMemberConfig,
    ) -> Result<ApiResponse, RpcError> {
        self.call_with(
            Operation::RestrictChatMember,
            slot::RESTRICT_CHAT_MEMBER_CONFIG,
            &config,
        )
        .await
    }

    async fn promote_chat_member(
        &self,
        config: PromoteChatMemberConfig,
    ) -> Result<ApiResponse, RpcError> {
        self.call_with(
            Operation::PromoteChatMember,
            slot::PROMOTE_CHAT_MEMBER_CONFIG,
            &config,
        )
        .await
    }

    async fn get_game_high_scores(
        &self,
        config: GetGameHighScoresConfig,
    ) -> Result<Vec<GameHighScore>, RpcError> {
        self.call_with(
            Operation::GetGameHighScores,
            slot::GET_GAME_HIGH_SCORES_CONFIG,
            &config,
        )
        .await
    }

    async fn answer_shipping_query(&self, config: ShippingConfig) -> Result<ApiResponse, RpcError> {
        self.call_with(Operation::AnswerShippingQuery, slot::SHIPPING_CONFIG, &config)
            .await
    }

    async fn answer_pre_checkout_query(
        &self,
        config: PreCheckoutConfig,
    ) -> Result<ApiResponse, RpcError> {
        self.call_with(
            Operation::AnswerPreCheckoutQuery,
            slot::PRE_CHECKOUT_CONFIG,
            &config,
        )
        .await
    }

    async fn delete_message(&self, config: DeleteMessageConfig) -> Result<ApiResponse, RpcError> {
        self.call_with(Operation::DeleteMessage, slot::DELETE_MESSAGE_CONFIG, &config)
            .await
    }

    async fn get_invite_link(&self, config: ChatConfig) -> Result<String, RpcError> {
        self.call_with(Operation::GetInviteLink, slot::CHAT_CONFIG, &config)
            .await
    }

    async fn pin_chat_message(&self, config: PinChatMessageConfig) -> Result<ApiResponse, RpcError> {
        self.call_with(
            Operation::PinChatMessage,
            slot::PIN_CHAT_MESSAGE_CONFIG,
            &config,
        )
        .await
    }

    async fn unpin_chat_message(
        &self,
        config: UnpinChatMessageConfig,
    ) -> Result<ApiResponse, RpcError> {
        self.call_with(
            Operation::UnpinChatMessage,
            slot::UNPIN_CHAT_MESSAGE_CONFIG,
            &config,
        )
        .await
    }

    async fn set_chat_title(&self, config: SetChatTitleConfig) -> Result<ApiResponse, RpcError> {
        self.call_with(Operation::SetChatTitle, slot::SET_CHAT_TITLE_CONFIG, &config)
            .await
    }

    async fn set_chat_description(
        &self,
        config: SetChatDescriptionConfig,
    ) -> Result<ApiResponse, RpcError> {
        self.call_with(
            Operation::SetChatDescription,
            slot::SET_CHAT_DESCRIPTION_CONFIG,
            &config,
        )
        .await
    }

    async fn set_chat_photo(&self, config: SetChatPhotoConfig) -> Result<ApiResponse, RpcError> {
        self.call_with(Operation::SetChatPhoto, slot::SET_CHAT_PHOTO_CONFIG, &config)
            .await
    }

    async fn delete_chat_photo(&self, config: DeleteChatPhotoConfig) -> Result<ApiResponse, RpcError> {
        self.call_with(
            Operation::DeleteChatPhoto,
            slot::DELETE_CHAT_PHOTO_CONFIG,
            &config,
        )
        .await
    }
}
