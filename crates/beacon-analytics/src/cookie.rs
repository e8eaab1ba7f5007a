// Copyright (c) 2025 the beacon authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! Cookie-based persistence backend.
//!
//! State is stored as a JSON blob in a single cookie named
//! `mp_{token}_mixpanel` (the name the companion browser-side client also
//! uses, so both sides read the same state). Writes queue exactly one
//! `Set-Cookie` header per store, replacing any stale one of the same name
//! while leaving every unrelated queued header untouched. The host
//! application drains [`pending_headers`](CookieBackend::pending_headers)
//! into its response.

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::{DateTime, Duration, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;

use crate::context::RequestContext;
use crate::storage::StorageBackend;

// Everything except RFC 3986 unreserved characters, like rawurlencode.
const COOKIE_VALUE: &AsciiSet = &NON_ALPHANUMERIC
	.remove(b'-')
	.remove(b'_')
	.remove(b'.')
	.remove(b'~');

/// Persists state in a response cookie, reading it back from the inbound
/// cookie map on the next request.
#[derive(Debug, Clone, Default)]
pub struct CookieBackend {
	request_cookies: HashMap<String, String>,
	host: Option<String>,
	cross_subdomain: bool,
	cookie_domain: Option<String>,
	cookie_path: String,
	headers: Vec<String>,
}

impl CookieBackend {
	/// Creates a backend reading from the given request's cookies and host.
	pub fn from_context(context: &RequestContext) -> Self {
		Self {
			request_cookies: context.cookies().clone(),
			host: context.host().map(str::to_string),
			cross_subdomain: true,
			cookie_domain: None,
			cookie_path: "/".to_string(),
			headers: Vec::new(),
		}
	}

	/// Whether to scope the cookie to the registrable domain so subdomains
	/// share state. Defaults to true.
	pub fn use_cross_subdomain(&mut self, enabled: bool) {
		self.cross_subdomain = enabled;
	}

	/// Overrides the cookie domain.
	pub fn set_cookie_domain(&mut self, domain: impl Into<String>) {
		self.cookie_domain = Some(domain.into());
	}

	/// Overrides the cookie path (defaults to `/`).
	pub fn set_cookie_path(&mut self, path: impl Into<String>) {
		self.cookie_path = path.into();
	}

	/// Queues a raw header line for the response. Exposed so unrelated
	/// already-queued cookies survive a state flush.
	pub fn queue_header(&mut self, header: impl Into<String>) {
		self.headers.push(header.into());
	}

	/// The domain the cookie is set for.
	///
	/// NOTE: the suffix match below yields the *same* results as the
	/// browser-side client, which are "incorrect" for multi-level public
	/// suffixes: `tech.vg.no` gives `.tech.vg.no` where `.vg.no` would be
	/// right. Both sides must agree on the domain to share the cookie, so
	/// the behaviour is kept.
	pub fn cookie_domain(&self) -> Option<String> {
		if let Some(domain) = &self.cookie_domain {
			return Some(domain.clone());
		}

		if !self.cross_subdomain {
			return None;
		}

		self.host.as_deref().and_then(derive_domain)
	}

	fn remove_queued_cookie(&mut self, cookie_name: &str) {
		let prefix = format!("set-cookie: {cookie_name}=").to_ascii_lowercase();
		self.headers.retain(|header| {
			let lowered = header.to_ascii_lowercase();
			!lowered.starts_with(&prefix)
		});
	}
}

/// The browser client's pattern, verbatim: a trailing `label.suffix` where
/// the suffix is 2-6 characters of letters and dots.
fn domain_pattern() -> &'static Regex {
	static PATTERN: OnceLock<Regex> = OnceLock::new();
	PATTERN.get_or_init(|| {
		Regex::new(r"(?i)[a-z0-9][a-z0-9\-]+\.[a-z\.]{2,6}$").expect("domain pattern compiles")
	})
}

fn derive_domain(host: &str) -> Option<String> {
	domain_pattern()
		.find(host)
		.map(|m| format!(".{}", m.as_str().to_ascii_lowercase()))
}

impl StorageBackend for CookieBackend {
	fn load(&self, storage_key: &str) -> Option<String> {
		self.request_cookies.get(storage_key).cloned()
	}

	fn persist(&mut self, storage_key: &str, blob: &str, lifetime_secs: u64) {
		// One cookie per store name: drop any stale queued header first.
		self.remove_queued_cookie(storage_key);

		// Absurd lifetimes saturate to the far future instead of wrapping.
		let lifetime = Duration::try_seconds(i64::try_from(lifetime_secs).unwrap_or(i64::MAX))
			.unwrap_or(Duration::MAX);
		let expires = Utc::now()
			.checked_add_signed(lifetime)
			.unwrap_or(DateTime::<Utc>::MAX_UTC)
			.format("%a, %d-%b-%Y %H:%M:%S GMT");
		let value = utf8_percent_encode(blob, COOKIE_VALUE);

		let mut header = format!(
			"Set-Cookie: {storage_key}={value}; expires={expires}; path={}",
			self.cookie_path
		);
		if let Some(domain) = self.cookie_domain() {
			header.push_str("; domain=");
			header.push_str(&domain);
		}

		self.headers.push(header);
	}

	fn default_storage_key(&self, project_token: Option<&str>, _user_key: Option<&str>) -> String {
		format!("mp_{}_mixpanel", project_token.unwrap_or(""))
	}

	fn pending_headers(&self) -> &[String] {
		&self.headers
	}
}
