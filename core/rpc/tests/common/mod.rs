// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use botrpc::broker::memory::MemoryBroker;
use botrpc::config::{ClientConfig, ServerConfig};
use botrpc::configs::*;
use botrpc::error::ApiError;
use botrpc::types::*;
use botrpc::{BotApi, Chattable, Dispatcher, RemoteBot, RemoteError};

pub const QUEUE: &str = "tgbotapi";
pub const BOT_USERNAME: &str = "stub_bot";

/// Bot answering from canned data and recording the calls it serves.
#[derive(Default)]
pub struct StubBot {
    calls: Mutex<Vec<&'static str>>,
}

impl StubBot {
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    fn record(&self, name: &'static str) {
        self.calls.lock().push(name);
    }

    pub fn me() -> User {
        User {
            id: 42,
            first_name: "Stub".to_string(),
            username: BOT_USERNAME.to_string(),
            is_bot: true,
            ..Default::default()
        }
    }

    fn ok(result: serde_json::Value) -> ApiResponse {
        ApiResponse {
            ok: true,
            result,
            ..Default::default()
        }
    }

    fn chat_not_found(chat_id: i64) -> RemoteError {
        RemoteError::Api(ApiError {
            error_code: 400,
            description: format!("Bad Request: chat {} not found", chat_id),
            ..Default::default()
        })
    }
}

#[async_trait]
impl BotApi for StubBot {
    type Error = RemoteError;

    async fn make_request(&self, endpoint: String, params: Params) -> Result<ApiResponse, RemoteError> {
        self.record("make_request");
        Ok(Self::ok(json!({ "endpoint": endpoint, "params": params })))
    }

    async fn upload_file(
        &self,
        endpoint: String,
        params: FormFields,
        field_name: String,
        file: FileSource,
    ) -> Result<ApiResponse, RemoteError> {
        self.record("upload_file");
        let size = match &file {
            FileSource::Bytes { data, .. } => data.len(),
            _ => 0,
        };
        Ok(Self::ok(json!({
            "endpoint": endpoint,
            "params": params,
            "field": field_name,
            "size": size,
        })))
    }

    async fn get_file_direct_url(&self, file_id: String) -> Result<String, RemoteError> {
        self.record("get_file_direct_url");
        if file_id.is_empty() {
            return Err(RemoteError::InvalidArgument("empty file id".to_string()));
        }
        Ok(format!("https://files.example/{}", file_id))
    }

    async fn get_me(&self) -> Result<User, RemoteError> {
        self.record("get_me");
        Ok(Self::me())
    }

    async fn is_message_to_me(&self, message: Message) -> bool {
        self.record("is_message_to_me");
        message.text.contains(&format!("@{}", BOT_USERNAME))
    }

    async fn send(&self, chattable: Chattable) -> Result<Message, RemoteError> {
        self.record("send");
        let mut sent = Message {
            message_id: 100,
            text: chattable.kind().as_str().to_string(),
            ..Default::default()
        };
        match chattable {
            Chattable::ForwardConfig(forward) => {
                sent.chat = Some(Chat {
                    id: forward.base.chat_id,
                    ..Default::default()
                });
                sent.forward_from_message_id = forward.message_id;
            }
            Chattable::MessageConfig(message) => {
                sent.chat = Some(Chat {
                    id: message.base.chat_id,
                    ..Default::default()
                });
                sent.text = message.text;
            }
            _ => {}
        }
        Ok(sent)
    }

    async fn get_user_profile_photos(
        &self,
        config: UserProfilePhotosConfig,
    ) -> Result<UserProfilePhotos, RemoteError> {
        self.record("get_user_profile_photos");
        Ok(UserProfilePhotos {
            total_count: 1,
            photos: vec![vec![PhotoSize {
                file_id: format!("photo-{}", config.user_id),
                width: 160,
                height: 160,
                ..Default::default()
            }]],
        })
    }

    async fn get_file(&self, config: FileConfig) -> Result<File, RemoteError> {
        self.record("get_file");
        Ok(File {
            file_path: format!("documents/{}.bin", config.file_id),
            file_id: config.file_id,
            file_size: 10,
        })
    }

    async fn get_updates(&self, config: UpdateConfig) -> Result<Vec<Update>, RemoteError> {
        self.record("get_updates");
        // three updates exist, ids 1 to 3
        Ok((config.offset.max(1)..=3)
            .map(|update_id| Update {
                update_id,
                ..Default::default()
            })
            .collect())
    }

    async fn remove_webhook(&self) -> Result<ApiResponse, RemoteError> {
        self.record("remove_webhook");
        Ok(Self::ok(json!(true)))
    }

    async fn set_webhook(&self, config: WebhookConfig) -> Result<ApiResponse, RemoteError> {
        self.record("set_webhook");
        Ok(Self::ok(json!({ "url": config.url })))
    }

    async fn get_webhook_info(&self) -> Result<WebhookInfo, RemoteError> {
        self.record("get_webhook_info");
        Ok(WebhookInfo {
            url: "https://hooks.example/bot".to_string(),
            pending_update_count: 2,
            ..Default::default()
        })
    }

    async fn answer_inline_query(&self, _config: InlineConfig) -> Result<ApiResponse, RemoteError> {
        self.record("answer_inline_query");
        Ok(Self::ok(json!(true)))
    }

    async fn answer_callback_query(
        &self,
        _config: CallbackConfig,
    ) -> Result<ApiResponse, RemoteError> {
        self.record("answer_callback_query");
        Ok(Self::ok(json!(true)))
    }

    async fn kick_chat_member(
        &self,
        _config: KickChatMemberConfig,
    ) -> Result<ApiResponse, RemoteError> {
        self.record("kick_chat_member");
        Ok(Self::ok(json!(true)))
    }

    async fn leave_chat(&self, _config: ChatConfig) -> Result<ApiResponse, RemoteError> {
        self.record("leave_chat");
        Ok(Self::ok(json!(true)))
    }

    async fn get_chat(&self, config: ChatConfig) -> Result<Chat, RemoteError> {
        self.record("get_chat");
        if config.chat_id < 0 {
            return Err(Self::chat_not_found(config.chat_id));
        }
        Ok(Chat {
            id: config.chat_id,
            kind: "group".to_string(),
            title: "crew".to_string(),
            ..Default::default()
        })
    }

    async fn get_chat_administrators(
        &self,
        _config: ChatConfig,
    ) -> Result<Vec<ChatMember>, RemoteError> {
        self.record("get_chat_administrators");
        Ok(vec![ChatMember {
            user: Some(Self::me()),
            status: "administrator".to_string(),
            ..Default::default()
        }])
    }

    async fn get_chat_members_count(&self, _config: ChatConfig) -> Result<i64, RemoteError> {
        self.record("get_chat_members_count");
        Ok(7)
    }

    async fn get_chat_member(&self, config: ChatConfigWithUser) -> Result<ChatMember, RemoteError> {
        self.record("get_chat_member");
        Ok(ChatMember {
            user: Some(User {
                id: config.user_id,
                ..Default::default()
            }),
            status: "member".to_string(),
            ..Default::default()
        })
    }

    async fn unban_chat_member(&self, _config: ChatMemberConfig) -> Result<ApiResponse, RemoteError> {
        self.record("unban_chat_member");
        Ok(Self::ok(json!(true)))
    }

    async fn restrict_chat_member(
        &self,
        _config: RestrictChatMemberConfig,
    ) -> Result<ApiResponse, RemoteError> {
        self.record("restrict_chat_member");
        Ok(Self::ok(json!(true)))
    }

    async fn promote_chat_member(
        &self,
        _config: PromoteChatMemberConfig,
    ) -> Result<ApiResponse, RemoteError> {
        self.record("promote_chat_member");
        Ok(Self::ok(json!(true)))
    }

    async fn get_game_high_scores(
        &self,
        _config: GetGameHighScoresConfig,
    ) -> Result<Vec<GameHighScore>, RemoteError> {
        self.record("get_game_high_scores");
        Ok(vec![GameHighScore {
            position: 1,
            user: Self::me(),
            score: 999,
        }])
    }

    async fn answer_shipping_query(&self, _config: ShippingConfig) -> Result<ApiResponse, RemoteError> {
        self.record("answer_shipping_query");
        Ok(Self::ok(json!(true)))
    }

    async fn answer_pre_checkout_query(
        &self,
        _config: PreCheckoutConfig,
    ) -> Result<ApiResponse, RemoteError> {
        self.record("answer_pre_checkout_query");
        Ok(Self::ok(json!(true)))
    }

    async fn delete_message(&self, _config: DeleteMessageConfig) -> Result<ApiResponse, RemoteError> {
        self.record("delete_message");
        Ok(Self::ok(json!(true)))
    }

    async fn get_invite_link(&self, config: ChatConfig) -> Result<String, RemoteError> {
        self.record("get_invite_link");
        Ok(format!("https://chat.example/join/{}", config.chat_id))
    }

    async fn pin_chat_message(&self, _config: PinChatMessageConfig) -> Result<ApiResponse, RemoteError> {
        self.record("pin_chat_message");
        Ok(Self::ok(json!(true)))
    }

    async fn unpin_chat_message(
        &self,
        _config: UnpinChatMessageConfig,
    ) -> Result<ApiResponse, RemoteError> {
        self.record("unpin_chat_message");
        Ok(Self::ok(json!(true)))
    }

    async fn set_chat_title(&self, config: SetChatTitleConfig) -> Result<ApiResponse, RemoteError> {
        self.record("set_chat_title");
        Ok(Self::ok(json!({ "title": config.title })))
    }

    async fn set_chat_description(
        &self,
        _config: SetChatDescriptionConfig,
    ) -> Result<ApiResponse, RemoteError> {
        self.record("set_chat_description");
        Ok(Self::ok(json!(true)))
    }

    async fn set_chat_photo(&self, _config: SetChatPhotoConfig) -> Result<ApiResponse, RemoteError> {
        self.record("set_chat_photo");
        Ok(Self::ok(json!(true)))
    }

    async fn delete_chat_photo(
        &self,
        _config: DeleteChatPhotoConfig,
    ) -> Result<ApiResponse, RemoteError> {
        self.record("delete_chat_photo");
        Ok(Self::ok(json!(true)))
    }
}

pub fn client_config(timeout: Duration) -> ClientConfig {
    ClientConfig::default()
        .with_request_queue(QUEUE)
        .with_timeout(timeout)
        .with_poll_interval(Duration::from_millis(20))
}

pub fn server_config() -> ServerConfig {
    ServerConfig::default()
        .with_request_queue(QUEUE)
        .with_reconnect_interval(Duration::from_millis(20))
        .with_drain_timeout(Duration::from_secs(2))
}

/// Wait until `count` consumers are attached to `queue`.
pub async fn wait_for_consumers(broker: &MemoryBroker, queue: &str, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while broker.consumer_count(queue) < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("consumers did not attach");
}

/// A served stub bot and a client talking to it over one in-memory broker.
pub struct Harness {
    pub broker: MemoryBroker,
    pub bot: Arc<StubBot>,
    pub dispatcher: Dispatcher<MemoryBroker, StubBot>,
    pub client: RemoteBot<MemoryBroker>,
    pub serving: tokio::task::JoinHandle<Result<(), botrpc::RpcError>>,
}

impl Harness {
    pub async fn start(config: ServerConfig) -> Self {
        let broker = MemoryBroker::new();
        let connection = Arc::new(broker.clone());
        let bot = Arc::new(StubBot::default());
        let workers = config.workers();

        let dispatcher = Dispatcher::new(connection.clone(), bot.clone(), config);
        let serving = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.serve().await })
        };
        wait_for_consumers(&broker, QUEUE, workers).await;

        let client = RemoteBot::new(connection, client_config(Duration::from_secs(2)));

        Harness {
            broker,
            bot,
            dispatcher,
            client,
            serving,
        }
    }

    pub async fn stop(self) {
        self.dispatcher.shutdown().await;
        self.serving
            .await
            .expect("serve task panicked")
            .expect("serve failed");
    }
}

/// Publish `body` to the request queue from a raw channel and wait for the
/// single reply.
pub async fn raw_request(
    broker: &MemoryBroker,
    body: Vec<u8>,
    correlation_id: &str,
) -> botrpc::broker::Delivery {
    use botrpc::broker::{Channel, Connection, MessageProperties, QueueOptions};
    use futures::StreamExt;

    let channel = broker.open_channel().await.unwrap();
    let reply_queue = channel.declare_queue("", QueueOptions::private()).await.unwrap();
    let mut replies = channel.consume(&reply_queue, true).await.unwrap();

    let properties = MessageProperties::default()
        .with_correlation_id(correlation_id)
        .with_reply_to(reply_queue.as_str());
    channel.publish(QUEUE, properties, body).await.unwrap();

    let delivery = tokio::time::timeout(Duration::from_secs(2), replies.next())
        .await
        .expect("no reply")
        .expect("reply stream closed")
        .unwrap();
    channel.close().await.unwrap();
    delivery
}
