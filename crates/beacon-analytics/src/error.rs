// Copyright (c) 2025 the beacon authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! Error types for the tracker SDK.
//!
//! Only misconfiguration surfaces as an error. Everything that can go wrong
//! at tracking time — missing token, blocked agent, unreachable endpoint —
//! degrades to a [`Dispatch::Skipped`](crate::tracker::Dispatch) outcome,
//! because telemetry must never take down the request it rides on.

use thiserror::Error;

/// Tracker configuration errors.
#[derive(Debug, Error)]
pub enum AnalyticsError {
	/// Every transport in the configured chain reported itself unsupported.
	#[error("no usable transport: all configured transports are unsupported")]
	NoUsableTransport,

	/// The collection endpoint could not be assembled into a valid URL.
	#[error("invalid collection endpoint: {0}")]
	InvalidEndpoint(String),

	/// The event payload could not be serialized.
	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

/// Result type alias for tracker operations.
pub type Result<T> = std::result::Result<T, AnalyticsError>;
