// Copyright (c) 2025 the beacon authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! The wire payload submitted to the collection endpoint.
//!
//! An event is serialized as `{"event": ..., "properties": {...}}`, then
//! base64-encoded and shipped as the `data` query parameter of an HTTP GET.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::properties::Properties;

/// Errors from decoding a wire payload.
#[derive(Debug, Error)]
pub enum PayloadError {
	#[error("payload is not valid base64: {0}")]
	InvalidBase64(#[from] base64::DecodeError),

	#[error("payload is not valid JSON: {0}")]
	InvalidJson(#[from] serde_json::Error),
}

/// A tracked event with its merged properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
	pub event: String,
	pub properties: Properties,
}

impl EventPayload {
	/// Creates a payload for the given event name and properties.
	pub fn new(event: impl Into<String>, properties: Properties) -> Self {
		Self {
			event: event.into(),
			properties,
		}
	}

	/// Serializes to JSON and base64-encodes the result.
	pub fn encode(&self) -> Result<String, serde_json::Error> {
		let json = serde_json::to_vec(self)?;
		Ok(BASE64.encode(json))
	}

	/// Decodes a base64 `data` parameter back into a payload.
	pub fn decode(data: &str) -> Result<Self, PayloadError> {
		let json = BASE64.decode(data)?;
		Ok(serde_json::from_slice(&json)?)
	}
}
