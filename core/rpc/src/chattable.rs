// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! The argument of `Send`: one of a closed set of send, edit and configure
//! requests. On the wire it is `{"type": <kind>, "payload": <record>}`, and
//! decoding resolves `type` through [`ChattableKind`] before touching the
//! payload.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::configs::*;
use crate::error::DecodeError;

macro_rules! chattables {
    ($($variant:ident),+ $(,)?) => {
        #[derive(Clone, Debug, PartialEq)]
        pub enum Chattable {
            $($variant($variant),)+
        }

        /// Discriminant of a [`Chattable`].
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum ChattableKind {
            $($variant,)+
        }

        impl ChattableKind {
            pub const ALL: &'static [ChattableKind] = &[$(ChattableKind::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(ChattableKind::$variant => stringify!($variant),)+
                }
            }
        }

        impl FromStr for ChattableKind {
            type Err = DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $(stringify!($variant) => Ok(ChattableKind::$variant),)+
                    other => Err(DecodeError::UnknownChattable(other.to_string())),
                }
            }
        }

        impl Chattable {
            pub fn kind(&self) -> ChattableKind {
                match self {
                    $(Chattable::$variant(_) => ChattableKind::$variant,)+
                }
            }

            /// Empty request of the given kind.
            pub fn empty(kind: ChattableKind) -> Self {
                match kind {
                    $(ChattableKind::$variant => Chattable::$variant($variant::default()),)+
                }
            }

            fn serialize_payload<S: SerializeStruct>(&self, state: &mut S) -> Result<(), S::Error> {
                match self {
                    $(Chattable::$variant(v) => state.serialize_field("payload", v),)+
                }
            }

            fn from_payload(kind: ChattableKind, payload: Value) -> Result<Self, serde_json::Error> {
                match kind {
                    $(ChattableKind::$variant => serde_json::from_value(payload).map(Chattable::$variant),)+
                }
            }
        }

        $(
            impl From<$variant> for Chattable {
                fn from(value: $variant) -> Self {
                    Chattable::$variant(value)
                }
            }
        )+
    };
}

chattables! {
    MessageConfig,
    ForwardConfig,
    PhotoConfig,
    AudioConfig,
    DocumentConfig,
    StickerConfig,
    VideoConfig,
    AnimationConfig,
    VideoNoteConfig,
    VoiceConfig,
    MediaGroupConfig,
    LocationConfig,
    VenueConfig,
    ContactConfig,
    GameConfig,
    SetGameScoreConfig,
    GetGameHighScoresConfig,
    ChatActionConfig,
    EditMessageTextConfig,
    EditMessageCaptionConfig,
    EditMessageReplyMarkupConfig,
    InvoiceConfig,
    DeleteMessageConfig,
    PinChatMessageConfig,
    UnpinChatMessageConfig,
    SetChatTitleConfig,
    SetChatDescriptionConfig,
    DeleteChatPhotoConfig,
}

impl fmt::Display for ChattableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Chattable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Chattable", 2)?;
        state.serialize_field("type", self.kind().as_str())?;
        self.serialize_payload(&mut state)?;
        state.end()
    }
}

#[derive(Deserialize)]
struct RawChattable {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

impl TryFrom<RawChattable> for Chattable {
    type Error = DecodeError;

    fn try_from(raw: RawChattable) -> Result<Self, Self::Error> {
        let kind = raw.kind.parse::<ChattableKind>()?;
        Chattable::from_payload(kind, raw.payload).map_err(|source| DecodeError::InvalidSlot {
            slot: crate::operation::slot::CHATTABLE,
            source,
        })
    }
}

impl<'de> Deserialize<'de> for Chattable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawChattable::deserialize(deserializer)?;
        Chattable::try_from(raw).map_err(D::Error::custom)
    }
}
