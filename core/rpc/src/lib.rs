// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! RPC transport for the bot control API over a message broker.
//!
//! [`RemoteBot`] implements [`BotApi`] by turning every call into a request
//! on a shared broker queue and waiting for the correlated reply on a private
//! one. [`Dispatcher`] consumes the shared queue and serves the requests with
//! a concrete [`BotApi`] implementation.

pub mod api;
pub mod chattable;
pub mod client;
pub mod configs;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod operation;
pub mod types;

pub use api::BotApi;
pub use chattable::{Chattable, ChattableKind};
pub use client::{CallState, RemoteBot};
pub use dispatcher::{Dispatcher, Handler, HandlerFuture, Registry};
pub use envelope::{RequestEnvelope, ResponseEnvelope, Slots};
pub use error::{ApiError, DecodeError, DispatchError, RemoteError, RpcError, WireError};
pub use operation::Operation;

pub use botrpc_broker as broker;
pub use botrpc_config as config;
