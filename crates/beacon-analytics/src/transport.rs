// Copyright (c) 2025 the beacon authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! Outbound transports.
//!
//! Tracking is best-effort telemetry on somebody else's request path, so
//! every transport applies sub-second timeouts and reports failure as a
//! value instead of an error. A [`TransportChain`] holds an explicit
//! ordered list of transports and uses the first one that reports itself
//! supported.

use std::time::Duration;

use tracing::debug;

/// Default connect/read timeout for tracking calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Outcome of a single tracking request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportResult {
	/// The request was dispatched; the response body was not read.
	Sent,
	/// The request was dispatched and the response body captured.
	SentWithBody(String),
	/// The request could not be dispatched in time, or at all.
	Failed,
}

impl TransportResult {
	pub fn is_sent(&self) -> bool {
		!matches!(self, TransportResult::Failed)
	}
}

/// A way of getting a tracking URL to the collection endpoint.
pub trait Transport: std::fmt::Debug {
	/// Whether this transport can run in the current environment.
	fn is_supported(&self) -> bool;

	/// Fires a GET at the URL. Reads the response body only when
	/// `want_body` is set (slower).
	fn request(&self, url: &str, want_body: bool) -> TransportResult;
}

/// HTTP transport over a blocking `reqwest` client.
#[derive(Debug)]
pub struct HttpTransport {
	client: Option<reqwest::blocking::Client>,
}

impl HttpTransport {
	pub fn new() -> Self {
		Self::with_timeout(DEFAULT_TIMEOUT)
	}

	/// Builds a transport with a custom connect/read timeout. Keep it
	/// short: a timed-out dispatch is a dropped event, not a retry.
	pub fn with_timeout(timeout: Duration) -> Self {
		let client = reqwest::blocking::Client::builder()
			.timeout(timeout)
			.connect_timeout(timeout)
			.build()
			.ok();

		Self { client }
	}
}

impl Default for HttpTransport {
	fn default() -> Self {
		Self::new()
	}
}

impl Transport for HttpTransport {
	fn is_supported(&self) -> bool {
		self.client.is_some()
	}

	fn request(&self, url: &str, want_body: bool) -> TransportResult {
		let Some(client) = &self.client else {
			return TransportResult::Failed;
		};

		match client.get(url).send() {
			Ok(response) if want_body => match response.text() {
				Ok(body) => TransportResult::SentWithBody(body),
				Err(err) => {
					debug!(error = %err, "failed to read tracking response body");
					TransportResult::Failed
				}
			},
			Ok(_) => TransportResult::Sent,
			Err(err) => {
				debug!(error = %err, "tracking request failed");
				TransportResult::Failed
			}
		}
	}
}

/// An ordered list of transports; the first supported one handles every
/// request.
#[derive(Debug, Default)]
pub struct TransportChain {
	transports: Vec<Box<dyn Transport>>,
}

impl TransportChain {
	/// Builds a chain from an explicit preference order.
	pub fn new(transports: Vec<Box<dyn Transport>>) -> Self {
		Self { transports }
	}

	/// The default preference order: plain HTTP.
	pub fn standard() -> Self {
		Self::new(vec![Box::new(HttpTransport::new())])
	}

	/// The first transport that reports itself supported, if any.
	pub fn first_supported(&self) -> Option<&dyn Transport> {
		self.transports
			.iter()
			.map(AsRef::as_ref)
			.find(|transport| transport.is_supported())
	}
}

impl Transport for TransportChain {
	fn is_supported(&self) -> bool {
		self.first_supported().is_some()
	}

	fn request(&self, url: &str, want_body: bool) -> TransportResult {
		match self.first_supported() {
			Some(transport) => transport.request(url, want_body),
			None => {
				debug!("no supported transport in chain, dropping event");
				TransportResult::Failed
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;

	#[derive(Debug, Clone)]
	struct FakeTransport {
		supported: bool,
		calls: Arc<AtomicUsize>,
	}

	impl FakeTransport {
		fn new(supported: bool) -> Self {
			Self {
				supported,
				calls: Arc::new(AtomicUsize::new(0)),
			}
		}
	}

	impl Transport for FakeTransport {
		fn is_supported(&self) -> bool {
			self.supported
		}

		fn request(&self, _url: &str, _want_body: bool) -> TransportResult {
			self.calls.fetch_add(1, Ordering::SeqCst);
			TransportResult::Sent
		}
	}

	#[test]
	fn chain_skips_unsupported_transports() {
		let unsupported = FakeTransport::new(false);
		let supported = FakeTransport::new(true);
		let chain = TransportChain::new(vec![
			Box::new(unsupported.clone()),
			Box::new(supported.clone()),
		]);

		assert!(chain.is_supported());
		assert_eq!(chain.request("http://t.test/", false), TransportResult::Sent);
		assert_eq!(unsupported.calls.load(Ordering::SeqCst), 0);
		assert_eq!(supported.calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn empty_chain_fails_softly() {
		let chain = TransportChain::new(vec![]);
		assert!(!chain.is_supported());
		assert_eq!(
			chain.request("http://t.test/", false),
			TransportResult::Failed
		);
	}

	#[test]
	fn preference_order_is_respected() {
		let first = FakeTransport::new(true);
		let second = FakeTransport::new(true);
		let chain = TransportChain::new(vec![Box::new(first.clone()), Box::new(second.clone())]);

		chain.request("http://t.test/", false);

		assert_eq!(first.calls.load(Ordering::SeqCst), 1);
		assert_eq!(second.calls.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn failed_is_not_sent() {
		assert!(!TransportResult::Failed.is_sent());
		assert!(TransportResult::Sent.is_sent());
		assert!(TransportResult::SentWithBody("ok".into()).is_sent());
	}
}
