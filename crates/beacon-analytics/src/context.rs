// Copyright (c) 2025 the beacon authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! Explicit request context.
//!
//! The tracker never reads ambient globals; everything it knows about the
//! inbound request — client address, user agent, host, query string,
//! referrer, cookies — is carried in a [`RequestContext`] value built by
//! the host application.

use std::collections::HashMap;

/// A snapshot of the inbound HTTP request the tracker is running for.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
	remote_addr: Option<String>,
	forwarded_for: Option<String>,
	user_agent: Option<String>,
	host: Option<String>,
	path_and_query: Option<String>,
	https: bool,
	referrer: Option<String>,
	query: HashMap<String, String>,
	cookies: HashMap<String, String>,
}

impl RequestContext {
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the peer address of the connection.
	pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
		self.remote_addr = Some(addr.into());
		self
	}

	/// Sets the raw `X-Forwarded-For` header value.
	pub fn with_forwarded_for(mut self, header: impl Into<String>) -> Self {
		self.forwarded_for = Some(header.into());
		self
	}

	/// Sets the `User-Agent` header value.
	pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = Some(user_agent.into());
		self
	}

	/// Sets the `Host` header value.
	pub fn with_host(mut self, host: impl Into<String>) -> Self {
		self.host = Some(host.into());
		self
	}

	/// Sets the request path including any query string, e.g. `/cart?step=2`.
	pub fn with_path_and_query(mut self, path: impl Into<String>) -> Self {
		self.path_and_query = Some(path.into());
		self
	}

	/// Marks the request as served over HTTPS.
	pub fn with_https(mut self, https: bool) -> Self {
		self.https = https;
		self
	}

	/// Sets the `Referer` header value.
	pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
		self.referrer = Some(referrer.into());
		self
	}

	/// Adds a parsed query string parameter.
	pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.insert(name.into(), value.into());
		self
	}

	/// Adds an inbound cookie.
	pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.cookies.insert(name.into(), value.into());
		self
	}

	pub fn user_agent(&self) -> Option<&str> {
		self.user_agent.as_deref()
	}

	pub fn host(&self) -> Option<&str> {
		self.host.as_deref()
	}

	pub fn referrer(&self) -> Option<&str> {
		self.referrer.as_deref()
	}

	pub fn query_param(&self, name: &str) -> Option<&str> {
		self.query.get(name).map(String::as_str)
	}

	pub fn cookie(&self, name: &str) -> Option<&str> {
		self.cookies.get(name).map(String::as_str)
	}

	pub fn cookies(&self) -> &HashMap<String, String> {
		&self.cookies
	}

	/// Resolves the client IP.
	///
	/// When `trust_proxy` is set and a forwarded-for chain is present, the
	/// first (client-most) non-empty entry wins; otherwise the connection
	/// peer address is used.
	pub fn client_ip(&self, trust_proxy: bool) -> Option<&str> {
		if trust_proxy {
			if let Some(forwarded) = self.forwarded_for.as_deref() {
				let first = forwarded.split(',').next().map(str::trim).unwrap_or("");
				if !first.is_empty() {
					return Some(first);
				}
			}
		}

		self.remote_addr.as_deref()
	}

	/// The scheme and host of the current request, e.g. `https://shop.example.com`.
	pub fn base_url(&self) -> Option<String> {
		let host = self.host.as_deref()?;
		let scheme = if self.https { "https" } else { "http" };
		Some(format!("{scheme}://{host}"))
	}

	/// The full URL of the current request.
	pub fn current_url(&self) -> Option<String> {
		let base = self.base_url()?;
		let path = self.path_and_query.as_deref().unwrap_or("/");
		Some(format!("{base}{path}"))
	}
}
