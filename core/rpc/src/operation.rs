// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::str::FromStr;

use crate::error::DecodeError;

/// Names of the envelope slots. Requests and responses share the namespace.
pub mod slot {
    // request
    pub const ENDPOINT: &str = "endpoint";
    pub const PARAMS: &str = "params";
    pub const FIELD_NAME: &str = "fieldname";
    pub const FILE: &str = "file";
    pub const FILE_ID: &str = "fileId";
    pub const MESSAGE: &str = "message";
    pub const CHATTABLE: &str = "chattable";
    pub const USER_PROFILE_PHOTOS_CONFIG: &str = "userProfilePhotosConfig";
    pub const FILE_CONFIG: &str = "fileConfig";
    pub const UPDATE_CONFIG: &str = "updateConfig";
    pub const WEBHOOK_CONFIG: &str = "webhookConfig";
    pub const INLINE_CONFIG: &str = "inlineConfig";
    pub const CALLBACK_CONFIG: &str = "callbackConfig";
    pub const KICK_CHAT_MEMBER_CONFIG: &str = "kickChatMemberConfig";
    pub const CHAT_CONFIG: &str = "chatConfig";
    pub const CHAT_CONFIG_WITH_USER: &str = "chatConfigWithUser";
    pub const CHAT_MEMBER_CONFIG: &str = "chatMemberConfig";
    pub const RESTRICT_CHAT_MEMBER_CONFIG: &str = "restrictChatMemberConfig";
    pub const PROMOTE_CHAT_MEMBER_CONFIG: &str = "promoteChatMemberConfig";
    pub const GET_GAME_HIGH_SCORES_CONFIG: &str = "getGameHighScoresConfig";
    pub const SHIPPING_CONFIG: &str = "shippingConfig";
    pub const PRE_CHECKOUT_CONFIG: &str = "preCheckoutConfig";
    pub const DELETE_MESSAGE_CONFIG: &str = "deleteMessageConfig";
    pub const PIN_CHAT_MESSAGE_CONFIG: &str = "pinChatMessageConfig";
    pub const UNPIN_CHAT_MESSAGE_CONFIG: &str = "unpinChatMessageConfig";
    pub const SET_CHAT_TITLE_CONFIG: &str = "setChatTitleConfig";
    pub const SET_CHAT_DESCRIPTION_CONFIG: &str = "setChatDescriptionConfig";
    pub const SET_CHAT_PHOTO_CONFIG: &str = "setChatPhotoConfig";
    pub const DELETE_CHAT_PHOTO_CONFIG: &str = "deleteChatPhotoConfig";

    // response
    pub const API_RESPONSE: &str = "apiResponse";
    pub const TEXT: &str = "text";
    pub const USER: &str = "user";
    pub const OK: &str = "ok";
    pub const USER_PROFILE_PHOTOS: &str = "userProfilePhotos";
    pub const UPDATES: &str = "updates";
    pub const WEBHOOK_INFO: &str = "webhookInfo";
    pub const CHAT: &str = "chat";
    pub const CHAT_MEMBERS: &str = "chatMembers";
    pub const COUNT: &str = "count";
    pub const CHAT_MEMBER: &str = "chatMember";
    pub const GAME_HIGH_SCORES: &str = "gameHighScores";
}

macro_rules! operations {
    ($($variant:ident),+ $(,)?) => {
        /// Tag naming the remote procedure an envelope invokes.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Operation {
            $($variant,)+
        }

        impl Operation {
            pub const ALL: &'static [Operation] = &[$(Operation::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Operation::$variant => stringify!($variant),)+
                }
            }
        }

        impl FromStr for Operation {
            type Err = DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $(stringify!($variant) => Ok(Operation::$variant),)+
                    other => Err(DecodeError::UnknownOperation(other.to_string())),
                }
            }
        }
    };
}

operations! {
    MakeRequest,
    UploadFile,
    GetFileDirectURL,
    GetMe,
    IsMessageToMe,
    Send,
    GetUserProfilePhotos,
    GetFile,
    GetUpdates,
    RemoveWebhook,
    SetWebhook,
    GetWebhookInfo,
    GetUpdatesChan,
    ListenForWebhook,
    AnswerInlineQuery,
    AnswerCallbackQuery,
    KickChatMember,
    LeaveChat,
    GetChat,
    GetChatAdministrators,
    GetChatMembersCount,
    GetChatMember,
    UnbanChatMember,
    RestrictChatMember,
    PromoteChatMember,
    GetGameHighScores,
    AnswerShippingQuery,
    AnswerPreCheckoutQuery,
    DeleteMessage,
    GetInviteLink,
    PinChatMessage,
    UnpinChatMessage,
    SetChatTitle,
    SetChatDescription,
    SetChatPhoto,
    DeleteChatPhoto,
}

impl Operation {
    /// Response slot holding the result. `None` for the operations returning
    /// a live update channel, which cannot cross the broker.
    pub fn result_slot(&self) -> Option<&'static str> {
        use Operation::*;
        let slot = match self {
            MakeRequest | UploadFile | RemoveWebhook | SetWebhook | AnswerInlineQuery
            | AnswerCallbackQuery | KickChatMember | LeaveChat | UnbanChatMember
            | RestrictChatMember | PromoteChatMember | AnswerShippingQuery
            | AnswerPreCheckoutQuery | DeleteMessage | PinChatMessage | UnpinChatMessage
            | SetChatTitle | SetChatDescription | SetChatPhoto | DeleteChatPhoto => {
                slot::API_RESPONSE
            }
            GetFileDirectURL | GetInviteLink => slot::TEXT,
            GetMe => slot::USER,
            IsMessageToMe => slot::OK,
            Send => slot::MESSAGE,
            GetUserProfilePhotos => slot::USER_PROFILE_PHOTOS,
            GetFile => slot::FILE,
            GetUpdates => slot::UPDATES,
            GetWebhookInfo => slot::WEBHOOK_INFO,
            GetChat => slot::CHAT,
            GetChatAdministrators => slot::CHAT_MEMBERS,
            GetChatMembersCount => slot::COUNT,
            GetChatMember => slot::CHAT_MEMBER,
            GetGameHighScores => slot::GAME_HIGH_SCORES,
            GetUpdatesChan | ListenForWebhook => return None,
        };
        Some(slot)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
