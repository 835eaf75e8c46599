// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;

use crate::chattable::Chattable;
use crate::configs::*;
use crate::types::*;

/// The bot control surface.
///
/// A concrete implementation talks to the chat service and is served by a
/// [`crate::Dispatcher`]; [`crate::RemoteBot`] implements the same trait by
/// proxying every call over the broker.
#[async_trait]
pub trait BotApi: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn make_request(
        &self,
        endpoint: String,
        params: Params,
    ) -> Result<ApiResponse, Self::Error>;

    async fn upload_file(
        &self,
        endpoint: String,
        params: FormFields,
        field_name: String,
        file: FileSource,
    ) -> Result<ApiResponse, Self::Error>;

    async fn get_file_direct_url(&self, file_id: String) -> Result<String, Self::Error>;

    async fn get_me(&self) -> Result<User, Self::Error>;

    /// Whether the message mentions or replies to the bot. Has no error
    /// path: implementations answer `false` when they cannot tell.
    async fn is_message_to_me(&self, message: Message) -> bool;

    async fn send(&self, chattable: Chattable) -> Result<Message, Self::Error>;

    async fn get_user_profile_photos(
        &self,
        config: UserProfilePhotosConfig,
    ) -> Result<UserProfilePhotos, Self::Error>;

    async fn get_file(&self, config: FileConfig) -> Result<File, Self::Error>;

    async fn get_updates(&self, config: UpdateConfig) -> Result<Vec<Update>, Self::Error>;

    async fn remove_webhook(&self) -> Result<ApiResponse, Self::Error>;

    async fn set_webhook(&self, config: WebhookConfig) -> Result<ApiResponse, Self::Error>;

    async fn get_webhook_info(&self) -> Result<WebhookInfo, Self::Error>;

    async fn answer_inline_query(&self, config: InlineConfig) -> Result<ApiResponse, Self::Error>;

    async fn answer_callback_query(
        &self,
        config: CallbackConfig,
    ) -> Result<ApiResponse, Self::Error>;

    async fn kick_chat_member(
        &self,
        config: KickChatMemberConfig,
    ) -> Result<ApiResponse, Self::Error>;

    async fn leave_chat(&self, config: ChatConfig) -> Result<ApiResponse, Self::Error>;

    async fn get_chat(&self, config: ChatConfig) -> Result<Chat, Self::Error>;

    async fn get_chat_administrators(
        &self,
        config: ChatConfig,
    ) -> Result<Vec<ChatMember>, Self::Error>;

    async fn get_chat_members_count(&self, config: ChatConfig) -> Result<i64, Self::Error>;

    async fn get_chat_member(&self, config: ChatConfigWithUser)
    -> Result<ChatMember, Self::Error>;

    async fn unban_chat_member(&self, config: ChatMemberConfig)
    -> Result<ApiResponse, Self::Error>;

    async fn restrict_chat_member(
        &self,
        config: RestrictChatMemberConfig,
    ) -> Result<ApiResponse, Self::Error>;

    async fn promote_chat_member(
        &self,
        config: PromoteChatMemberConfig,
    ) -> Result<ApiResponse, Self::Error>;

    async fn get_game_high_scores(
        &self,
        config: GetGameHighScoresConfig,
    ) -> Result<Vec<GameHighScore>, Self::Error>;

    async fn answer_shipping_query(
        &self,
        config: ShippingConfig,
    ) -> Result<ApiResponse, Self::Error>;

    async fn answer_pre_checkout_query(
        &self,
        config: PreCheckoutConfig,
    ) -> Result<ApiResponse, Self::Error>;

    async fn delete_message(&self, config: DeleteMessageConfig)
    -> Result<ApiResponse, Self::Error>;

    async fn get_invite_link(&self, config: ChatConfig) -> Result<String, Self::Error>;

    async fn pin_chat_message(
        &self,
        config: PinChatMessageConfig,
    ) -> Result<ApiResponse, Self::Error>;

    async fn unpin_chat_message(
        &self,
        config: UnpinChatMessageConfig,
    ) -> Result<ApiResponse, Self::Error>;

    async fn set_chat_title(&self, config: SetChatTitleConfig) -> Result<ApiResponse, Self::Error>;

    async fn set_chat_description(
        &self,
        config: SetChatDescriptionConfig,
    ) -> Result<ApiResponse, Self::Error>;

    async fn set_chat_photo(&self, config: SetChatPhotoConfig) -> Result<ApiResponse, Self::Error>;

    async fn delete_chat_photo(
        &self,
        config: DeleteChatPhotoConfig,
    ) -> Result<ApiResponse, Self::Error>;
}
