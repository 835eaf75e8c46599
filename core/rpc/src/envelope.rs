// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Request and response envelopes.
//!
//! Both are JSON objects holding `operation` and `correlationId` next to the
//! named slots of the call. Decoding happens in two passes: the head is read
//! first with the slots kept as raw values, then each operation takes the
//! slots it needs into their concrete types. A request whose slots are
//! broken therefore still yields the correlation id needed to answer it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DecodeError, RemoteError, WireError};
use crate::operation::Operation;

/// Named values of an envelope, kept raw until an operation claims them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slots(Map<String, Value>);

impl Slots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value` under `name`.
    pub fn with<T: Serialize + ?Sized>(
        mut self,
        name: &str,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        self.0.insert(name.to_string(), serde_json::to_value(value)?);
        Ok(self)
    }

    /// Remove the slot `name` and decode it.
    pub fn take<T: DeserializeOwned>(&mut self, name: &'static str) -> Result<T, DecodeError> {
        let value = self.0.remove(name).ok_or(DecodeError::MissingSlot(name))?;
        serde_json::from_value(value).map_err(|source| DecodeError::InvalidSlot { slot: name, source })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    pub operation: String,
    pub correlation_id: String,
    #[serde(flatten)]
    pub slots: Slots,
}

impl RequestEnvelope {
    pub fn new(operation: Operation, correlation_id: impl Into<String>, slots: Slots) -> Self {
        RequestEnvelope {
            operation: operation.as_str().to_string(),
            correlation_id: correlation_id.into(),
            slots,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// First decoding pass: the head, with the slots left raw.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        serde_json::from_slice(bytes).map_err(DecodeError::Malformed)
    }

    /// Resolve the operation tag.
    pub fn operation(&self) -> Result<Operation, DecodeError> {
        self.operation.parse()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub operation: String,
    pub correlation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
    #[serde(flatten)]
    pub slots: Slots,
}

impl ResponseEnvelope {
    pub fn success(
        operation: impl Into<String>,
        correlation_id: impl Into<String>,
        slots: Slots,
    ) -> Self {
        ResponseEnvelope {
            operation: operation.into(),
            correlation_id: correlation_id.into(),
            error: None,
            slots,
        }
    }

    pub fn failure(
        operation: impl Into<String>,
        correlation_id: impl Into<String>,
        error: &RemoteError,
    ) -> Self {
        ResponseEnvelope {
            operation: operation.into(),
            correlation_id: correlation_id.into(),
            error: Some(error.to_wire()),
            slots: Slots::new(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        serde_json::from_slice(bytes).map_err(DecodeError::Malformed)
    }

    /// Decode the result of `operation`, or the carried error.
    pub fn into_result<T: DeserializeOwned>(
        mut self,
        operation: Operation,
    ) -> Result<Result<T, RemoteError>, DecodeError> {
        if let Some(error) = self.error.take() {
            return Ok(Err(RemoteError::from_wire(error)));
        }
        let slot = operation
            .result_slot()
            .ok_or(DecodeError::MissingSlot("result"))?;
        self.slots.take(slot).map(Ok)
    }
}
