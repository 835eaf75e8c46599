// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use botrpc_broker::BrokerError;
use botrpc_config::ConfigurationError;

/// Error reported by the chat service itself.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiError {
    pub error_code: i64,
    pub description: String,
    pub retry_after: Option<i64>,
    pub migrate_to_chat_id: Option<i64>,
}

/// Application error carried back to the caller in a response.
#[derive(Clone, Debug, PartialEq)]
pub enum RemoteError {
    /// plain error known only by its text
    Message(String),
    /// error with context and an optional cause
    Wrapped {
        context: String,
        cause: Option<Box<RemoteError>>,
    },
    Api(ApiError),
    /// the dispatcher has no handler for the operation
    NotImplemented(String),
    InvalidArgument(String),
}

/// Wire form of a [`RemoteError`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WireError {
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Serialize, Deserialize)]
struct WrappedPayload {
    context: String,
    #[serde(default)]
    cause: Option<Box<WireError>>,
}

#[derive(Serialize, Deserialize)]
struct OperationPayload {
    operation: String,
}

#[derive(Serialize, Deserialize)]
struct ReasonPayload {
    reason: String,
}

impl RemoteError {
    pub const KIND_MESSAGE: &'static str = "message";
    pub const KIND_WRAPPED: &'static str = "wrapped";
    pub const KIND_API: &'static str = "api";
    pub const KIND_NOT_IMPLEMENTED: &'static str = "not_implemented";
    pub const KIND_INVALID_ARGUMENT: &'static str = "invalid_argument";

    pub fn message(text: impl Into<String>) -> Self {
        RemoteError::Message(text.into())
    }

    pub fn wrap(context: impl Into<String>, cause: RemoteError) -> Self {
        RemoteError::Wrapped {
            context: context.into(),
            cause: Some(Box::new(cause)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RemoteError::Message(_) => Self::KIND_MESSAGE,
            RemoteError::Wrapped { .. } => Self::KIND_WRAPPED,
            RemoteError::Api(_) => Self::KIND_API,
            RemoteError::NotImplemented(_) => Self::KIND_NOT_IMPLEMENTED,
            RemoteError::InvalidArgument(_) => Self::KIND_INVALID_ARGUMENT,
        }
    }

    pub fn to_wire(&self) -> WireError {
        let payload = match self {
            RemoteError::Message(_) => Value::Null,
            RemoteError::Wrapped { context, cause } => to_value(&WrappedPayload {
                context: context.clone(),
                cause: cause.as_ref().map(|c| Box::new(c.to_wire())),
            }),
            RemoteError::Api(api) => to_value(api),
            RemoteError::NotImplemented(operation) => to_value(&OperationPayload {
                operation: operation.clone(),
            }),
            RemoteError::InvalidArgument(reason) => to_value(&ReasonPayload {
                reason: reason.clone(),
            }),
        };

        WireError {
            kind: self.kind().to_string(),
            message: self.to_string(),
            payload,
        }
    }

    /// Rebuild an error from its wire form. Unknown kinds, or payloads that
    /// do not match their kind, come back as [`RemoteError::Message`].
    pub fn from_wire(wire: WireError) -> Self {
        let WireError {
            kind,
            message,
            payload,
        } = wire;

        let decoded = match kind.as_str() {
            Self::KIND_MESSAGE => Some(RemoteError::Message(message.clone())),
            Self::KIND_WRAPPED => serde_json::from_value::<WrappedPayload>(payload)
                .ok()
                .map(|p| RemoteError::Wrapped {
                    context: p.context,
                    cause: p.cause.map(|c| Box::new(RemoteError::from_wire(*c))),
                }),
            Self::KIND_API => serde_json::from_value(payload).ok().map(RemoteError::Api),
            Self::KIND_NOT_IMPLEMENTED => serde_json::from_value::<OperationPayload>(payload)
                .ok()
                .map(|p| RemoteError::NotImplemented(p.operation)),
            Self::KIND_INVALID_ARGUMENT => serde_json::from_value::<ReasonPayload>(payload)
                .ok()
                .map(|p| RemoteError::InvalidArgument(p.reason)),
            _ => None,
        };

        decoded.unwrap_or(RemoteError::Message(message))
    }
}

// The payloads above only hold strings, integers and nested payloads.
fn to_value<T: Serialize>(payload: &T) -> Value {
    serde_json::to_value(payload).unwrap_or(Value::Null)
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteError::Message(text) => f.write_str(text),
            RemoteError::Wrapped {
                context,
                cause: Some(cause),
            } => write!(f, "{}: {}", context, cause),
            RemoteError::Wrapped { context, cause: None } => f.write_str(context),
            RemoteError::Api(api) => write!(f, "{} (code {})", api.description, api.error_code),
            RemoteError::NotImplemented(operation) => write!(f, "{}: not implemented", operation),
            RemoteError::InvalidArgument(reason) => write!(f, "invalid argument: {}", reason),
        }
    }
}

impl std::error::Error for RemoteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RemoteError::Wrapped {
                cause: Some(cause), ..
            } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

/// Failure of one envelope decoding step.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("unknown operation {0}")]
    UnknownOperation(String),
    #[error("missing slot {0}")]
    MissingSlot(&'static str),
    #[error("invalid slot {slot}: {source}")]
    InvalidSlot {
        slot: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown chattable type {0}")]
    UnknownChattable(String),
}

/// Error returned by a [`crate::RemoteBot`] call.
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("{context}: {source}")]
    Transport {
        context: &'static str,
        #[source]
        source: BrokerError,
    },

    #[error("no reply within {0:?}")]
    Timeout(Duration),

    #[error("failed to convert body to response: {0}")]
    Decode(#[from] DecodeError),

    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigurationError),
}

impl RpcError {
    pub fn transport(context: &'static str, source: BrokerError) -> Self {
        RpcError::Transport { context, source }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RpcError::Timeout(_))
    }

    /// The application error carried by the reply, if any.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            RpcError::Remote(e) => Some(e),
            _ => None,
        }
    }
}

/// Lets a dispatcher serve a [`crate::RemoteBot`], forwarding calls further.
impl From<RpcError> for RemoteError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Remote(e) => e,
            other => RemoteError::Wrapped {
                context: "remote bot".to_string(),
                cause: Some(Box::new(RemoteError::Message(other.to_string()))),
            },
        }
    }
}

/// Failure observed by a dispatcher worker. Handed to the error handler,
/// never fatal to the worker.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("failed to decode request: {0}")]
    Decode(#[from] DecodeError),

    #[error("delivery {delivery_tag} has no reply_to, nobody to answer")]
    NoReplyTo { delivery_tag: u64 },

    #[error("failed to encode response for {operation}: {source}")]
    Encode {
        operation: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to publish a message: {0}")]
    Publish(#[source] BrokerError),

    #[error("failed to acknowledge delivery {delivery_tag}: {source}")]
    Ack {
        delivery_tag: u64,
        #[source]
        source: BrokerError,
    },

    #[error("consumer failed: {0}")]
    Consumer(#[source] BrokerError),

    #[error("failed to reopen worker channel: {0}")]
    Reconnect(#[source] RpcError),
}
