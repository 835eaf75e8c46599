// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Argument records of the bot API operations.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where the content of an upload comes from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FileSource {
    /// file already stored by the chat service
    Id(String),
    Url(String),
    /// path on the machine running the dispatcher
    Path(String),
    Bytes { name: String, data: Vec<u8> },
}

impl Default for FileSource {
    fn default() -> Self {
        FileSource::Id(String::new())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseChat {
    pub chat_id: i64,
    pub channel_username: String,
    pub reply_to_message_id: i64,
    pub reply_markup: Option<Value>,
    pub disable_notification: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseFile {
    #[serde(flatten)]
    pub base: BaseChat,
    pub file: FileSource,
    pub mime_type: String,
    pub file_size: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseEdit {
    pub chat_id: i64,
    pub channel_username: String,
    pub message_id: i64,
    pub inline_message_id: String,
    pub reply_markup: Option<Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageConfig {
    #[serde(flatten)]
    pub base: BaseChat,
    pub text: String,
    pub parse_mode: String,
    pub disable_web_page_preview: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardConfig {
    #[serde(flatten)]
    pub base: BaseChat,
    pub from_chat_id: i64,
    pub from_channel_username: String,
    pub message_id: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotoConfig {
    #[serde(flatten)]
    pub base: BaseFile,
    pub caption: String,
    pub parse_mode: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    #[serde(flatten)]
    pub base: BaseFile,
    pub caption: String,
    pub parse_mode: String,
    pub duration: i64,
    pub performer: String,
    pub title: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    #[serde(flatten)]
    pub base: BaseFile,
    pub caption: String,
    pub parse_mode: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StickerConfig {
    #[serde(flatten)]
    pub base: BaseFile,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    #[serde(flatten)]
    pub base: BaseFile,
    pub duration: i64,
    pub caption: String,
    pub parse_mode: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    #[serde(flatten)]
    pub base: BaseFile,
    pub duration: i64,
    pub caption: String,
    pub parse_mode: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoNoteConfig {
    #[serde(flatten)]
    pub base: BaseFile,
    pub duration: i64,
    pub length: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    #[serde(flatten)]
    pub base: BaseFile,
    pub caption: String,
    pub parse_mode: String,
    pub duration: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaGroupConfig {
    #[serde(flatten)]
    pub base: BaseChat,
    pub input_media: Vec<Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    #[serde(flatten)]
    pub base: BaseChat,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VenueConfig {
    #[serde(flatten)]
    pub base: BaseChat,
    pub latitude: f64,
    pub longitude: f64,
    pub title: String,
    pub address: String,
    pub foursquare_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactConfig {
    #[serde(flatten)]
    pub base: BaseChat,
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    #[serde(flatten)]
    pub base: BaseChat,
    pub game_short_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetGameScoreConfig {
    pub user_id: i64,
    pub score: i64,
    pub force: bool,
    pub disable_edit_message: bool,
    pub chat_id: i64,
    pub channel_username: String,
    pub message_id: i64,
    pub inline_message_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GetGameHighScoresConfig {
    pub user_id: i64,
    pub chat_id: i64,
    pub channel_username: String,
    pub message_id: i64,
    pub inline_message_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatActionConfig {
    #[serde(flatten)]
    pub base: BaseChat,
    pub action: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditMessageTextConfig {
    #[serde(flatten)]
    pub base: BaseEdit,
    pub text: String,
    pub parse_mode: String,
    pub disable_web_page_preview: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditMessageCaptionConfig {
    #[serde(flatten)]
    pub base: BaseEdit,
    pub caption: String,
    pub parse_mode: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditMessageReplyMarkupConfig {
    #[serde(flatten)]
    pub base: BaseEdit,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabeledPrice {
    pub label: String,
    pub amount: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceConfig {
    #[serde(flatten)]
    pub base: BaseChat,
    pub title: String,
    pub description: String,
    pub payload: String,
    pub provider_token: String,
    pub start_parameter: String,
    pub currency: String,
    pub prices: Vec<LabeledPrice>,
    pub photo_url: String,
    pub need_shipping_address: bool,
    pub is_flexible: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeleteMessageConfig {
    pub chat_id: i64,
    pub message_id: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinChatMessageConfig {
    pub chat_id: i64,
    pub message_id: i64,
    pub disable_notification: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnpinChatMessageConfig {
    pub chat_id: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetChatTitleConfig {
    pub chat_id: i64,
    pub title: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetChatDescriptionConfig {
    pub chat_id: i64,
    pub description: String,
}

/// Carries an upload, so it travels through `SetChatPhoto` rather than `Send`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetChatPhotoConfig {
    #[serde(flatten)]
    pub base: BaseFile,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeleteChatPhotoConfig {
    pub chat_id: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfilePhotosConfig {
    pub user_id: i64,
    pub offset: i64,
    pub limit: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub file_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    pub offset: i64,
    pub limit: i64,
    /// long polling timeout, in seconds
    pub timeout: i64,
}

impl UpdateConfig {
    pub fn new(offset: i64) -> Self {
        UpdateConfig {
            offset,
            limit: 0,
            timeout: 0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub url: String,
    pub certificate: Option<FileSource>,
    pub max_connections: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InlineConfig {
    pub inline_query_id: String,
    pub results: Vec<Value>,
    pub cache_time: i64,
    pub is_personal: bool,
    pub next_offset: String,
    pub switch_pm_text: String,
    pub switch_pm_parameter: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallbackConfig {
    pub callback_query_id: String,
    pub text: String,
    pub show_alert: bool,
    pub url: String,
    pub cache_time: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub chat_id: i64,
    pub super_group_username: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfigWithUser {
    pub chat_id: i64,
    pub super_group_username: String,
    pub user_id: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatMemberConfig {
    pub chat_id: i64,
    pub super_group_username: String,
    pub channel_username: String,
    pub user_id: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KickChatMemberConfig {
    #[serde(flatten)]
    pub member: ChatMemberConfig,
    pub until_date: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestrictChatMemberConfig {
    #[serde(flatten)]
    pub member: ChatMemberConfig,
    pub until_date: i64,
    pub can_send_messages: Option<bool>,
    pub can_send_media_messages: Option<bool>,
    pub can_send_other_messages: Option<bool>,
    pub can_add_web_page_previews: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromoteChatMemberConfig {
    #[serde(flatten)]
    pub member: ChatMemberConfig,
    pub can_change_info: Option<bool>,
    pub can_post_messages: Option<bool>,
    pub can_edit_messages: Option<bool>,
    pub can_delete_messages: Option<bool>,
    pub can_invite_users: Option<bool>,
    pub can_restrict_members: Option<bool>,
    pub can_pin_messages: Option<bool>,
    pub can_promote_members: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShippingOption {
    pub id: String,
    pub title: String,
    pub prices: Vec<LabeledPrice>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShippingConfig {
    pub shipping_query_id: String,
    pub ok: bool,
    pub shipping_options: Vec<ShippingOption>,
    pub error_message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreCheckoutConfig {
    pub pre_checkout_query_id: String,
    pub ok: bool,
    pub error_message: String,
}
