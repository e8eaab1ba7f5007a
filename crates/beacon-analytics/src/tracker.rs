// Copyright (c) 2025 the beacon authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! The event tracker.
//!
//! A [`Tracker`] is request-scoped: one instance per inbound request,
//! fed an explicit [`RequestContext`], owning one [`StateStore`] and one
//! transport. Collaborators are default-constructed lazily (cookie-backed
//! storage, entropy ID generator, HTTP transport chain) unless injected.
//!
//! Tracking never throws. Anything that prevents an event from going out
//! — missing token, bot traffic, unreachable endpoint — comes back as a
//! [`Dispatch::Skipped`] value and the host request carries on.

use std::net::IpAddr;

use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use beacon_analytics_core::{EntropyIdGenerator, EventPayload, IdGenerator, Properties};

use crate::agent;
use crate::context::RequestContext;
use crate::cookie::CookieBackend;
use crate::error::AnalyticsError;
use crate::referrer::{self, DIRECT_REFERRER};
use crate::storage::{StateStore, ALIAS_KEY, DISTINCT_ID_KEY};
use crate::transport::{Transport, TransportChain};

/// UTM-style acquisition parameters captured as first-touch attribution.
pub const CAMPAIGN_PARAMS: &[&str] = &[
	"utm_source",
	"utm_medium",
	"utm_campaign",
	"utm_content",
	"utm_term",
];

/// Why an event was not dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
	/// No project token configured and none supplied in the properties.
	MissingToken,
	/// The user agent matched a known bot pattern.
	BlockedUserAgent,
	/// Alias requested but no distinct ID was resolvable.
	NoDistinctId,
	/// A relative page URL could not be resolved against the request.
	UnresolvedPageUrl,
	/// The collection endpoint URL could not be built.
	InvalidEndpoint,
	/// The transport reported failure or timed out.
	TransportFailed,
}

/// Outcome of a tracking call: dispatched to the transport, or skipped.
///
/// There is no partial success and no retry; a skipped or failed event is
/// simply dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
	Sent,
	Skipped(SkipReason),
}

impl Dispatch {
	pub fn is_sent(self) -> bool {
		matches!(self, Dispatch::Sent)
	}
}

/// Tracker behaviour toggles.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
	/// Host of the collection endpoint.
	pub api_host: String,
	/// Whether to reach the collection endpoint over HTTPS.
	pub secure: bool,
	/// Capture `$initial_referrer` / `$initial_referring_domain` and
	/// search engine metadata as super properties.
	pub capture_referrer: bool,
	/// Capture `utm_*` campaign parameters as first-touch super properties.
	pub capture_campaign_params: bool,
	/// Tag outgoing requests with `test=1`.
	pub test_mode: bool,
}

impl Default for TrackerConfig {
	fn default() -> Self {
		Self {
			api_host: "api.mixpanel.com".to_string(),
			secure: false,
			capture_referrer: true,
			capture_campaign_params: true,
			test_mode: false,
		}
	}
}

impl TrackerConfig {
	/// Checks that the collection endpoint assembles into a valid URL.
	pub fn validate(&self) -> Result<(), AnalyticsError> {
		let scheme = if self.secure { "https" } else { "http" };
		let base = format!("{scheme}://{}/track/", self.api_host);
		Url::parse(&base)
			.map(|_| ())
			.map_err(|err| AnalyticsError::InvalidEndpoint(format!("{base}: {err}")))
	}
}

/// Server-side analytics event tracker.
///
/// # Example
///
/// ```no_run
/// use beacon_analytics::{RequestContext, Tracker};
///
/// let context = RequestContext::new()
///     .with_remote_addr("203.0.113.7")
///     .with_user_agent("Mozilla/5.0 (X11; Linux x86_64) Firefox/120.0")
///     .with_host("shop.example.com");
///
/// let mut tracker = Tracker::with_token("my-project-token", context);
/// tracker.identify("user-42");
/// tracker.track("purchase", beacon_analytics::Properties::new().insert("amount", 99.5));
/// ```
pub struct Tracker {
	token: Option<String>,
	distinct_id: Option<String>,
	trust_proxy: bool,
	user_agent_override: Option<String>,
	config: TrackerConfig,
	context: RequestContext,
	storage: Option<StateStore>,
	generator: Option<Box<dyn IdGenerator>>,
	transport: Option<Box<dyn Transport>>,
}

impl std::fmt::Debug for Tracker {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Tracker")
			.field("token", &self.token)
			.field("distinct_id", &self.distinct_id)
			.field("trust_proxy", &self.trust_proxy)
			.field("config", &self.config)
			.finish_non_exhaustive()
	}
}

impl Tracker {
	/// Creates a tracker for one request. A project token must be set
	/// before any tracking call succeeds.
	pub fn new(context: RequestContext) -> Self {
		Self {
			token: None,
			distinct_id: None,
			trust_proxy: false,
			user_agent_override: None,
			config: TrackerConfig::default(),
			context,
			storage: None,
			generator: None,
			transport: None,
		}
	}

	/// Creates a tracker with the project token already set.
	pub fn with_token(token: impl Into<String>, context: RequestContext) -> Self {
		let mut tracker = Self::new(context);
		tracker.set_token(token);
		tracker
	}

	/// Sets the project the events belong to.
	pub fn set_token(&mut self, token: impl Into<String>) {
		let token = token.into();
		if let Some(storage) = self.storage.as_mut() {
			storage.set_project_token(token.clone());
		}
		self.token = Some(token);
	}

	pub fn token(&self) -> Option<&str> {
		self.token.as_deref()
	}

	/// Whether to trust the `X-Forwarded-For` header when resolving the
	/// client IP. Off by default.
	pub fn set_trust_proxy(&mut self, trust: bool) {
		self.trust_proxy = trust;
	}

	pub fn trusts_proxy(&self) -> bool {
		self.trust_proxy
	}

	/// Replaces the behaviour toggles, validating the endpoint first.
	pub fn set_config(&mut self, config: TrackerConfig) -> Result<(), AnalyticsError> {
		config.validate()?;
		self.config = config;
		Ok(())
	}

	pub fn config(&self) -> &TrackerConfig {
		&self.config
	}

	/// Overrides the user agent taken from the request context.
	pub fn set_client_user_agent(&mut self, user_agent: impl Into<String>) {
		self.user_agent_override = Some(user_agent.into());
	}

	/// The user agent used for classification and entropy: the explicit
	/// override if set, else the request header, else empty.
	pub fn client_user_agent(&self) -> String {
		self.user_agent_override
			.clone()
			.or_else(|| self.context.user_agent().map(str::to_string))
			.unwrap_or_default()
	}

	/// The resolved client IP, honouring the trust-proxy setting.
	pub fn client_ip(&self) -> String {
		self.context
			.client_ip(self.trust_proxy)
			.unwrap_or_default()
			.to_string()
	}

	/// Injects a state store (replacing the default cookie-backed one).
	pub fn set_storage(&mut self, mut storage: StateStore) {
		if let Some(token) = &self.token {
			storage.set_project_token(token.clone());
		}
		if let Some(id) = &self.distinct_id {
			storage.set_user_key(id.clone());
		}
		self.storage = Some(storage);
	}

	/// The state store, default-constructed on first use: cookie-backed,
	/// scoped to the current token and user.
	pub fn storage(&mut self) -> &mut StateStore {
		if self.storage.is_none() {
			let mut storage = StateStore::new(Box::new(CookieBackend::from_context(&self.context)));
			if let Some(token) = &self.token {
				storage.set_project_token(token.clone());
			}
			if let Some(id) = &self.distinct_id {
				storage.set_user_key(id.clone());
			}
			self.storage = Some(storage);
		}

		self.storage.as_mut().expect("storage initialized above")
	}

	/// Injects an ID generator.
	pub fn set_id_generator(&mut self, generator: Box<dyn IdGenerator>) {
		self.generator = Some(generator);
	}

	fn generator(&mut self) -> &dyn IdGenerator {
		if self.generator.is_none() {
			self.generator = Some(Box::new(EntropyIdGenerator::new()));
		}

		self.generator.as_deref().expect("generator initialized above")
	}

	/// Injects a single transport.
	pub fn set_transport(&mut self, transport: Box<dyn Transport>) {
		self.transport = Some(transport);
	}

	/// Installs an ordered transport preference list. Fails when none of
	/// the transports reports itself supported.
	pub fn set_transports(
		&mut self,
		transports: Vec<Box<dyn Transport>>,
	) -> Result<(), AnalyticsError> {
		let chain = TransportChain::new(transports);
		if !chain.is_supported() {
			return Err(AnalyticsError::NoUsableTransport);
		}

		self.transport = Some(Box::new(chain));
		Ok(())
	}

	fn transport(&mut self) -> &dyn Transport {
		if self.transport.is_none() {
			self.transport = Some(Box::new(TransportChain::standard()));
		}

		self.transport.as_deref().expect("transport initialized above")
	}

	/// Sets the active distinct ID and scopes the state store to it.
	pub fn identify(&mut self, distinct_id: impl Into<String>) {
		let id = distinct_id.into();
		self.distinct_id = Some(id.clone());
		self.storage().set_user_key(id);
	}

	/// Resolves the distinct ID: the explicit one if set, else the stored
	/// one, else — only when `create_if_absent` — a freshly generated one
	/// which is immediately identified and persisted.
	pub fn get_distinct_id(&mut self, create_if_absent: bool) -> Option<String> {
		if let Some(id) = &self.distinct_id {
			return Some(id.clone());
		}

		let stored = self.storage().get(DISTINCT_ID_KEY).cloned();
		if let Some(Value::String(id)) = stored {
			return Some(id);
		}

		if !create_if_absent {
			return None;
		}

		let user_agent = self.client_user_agent();
		let client_ip = self.client_ip();
		let id = self.generator().generate(&user_agent, &client_ip);
		debug!(distinct_id = %id, "generated anonymous distinct id");
		self.identify(id.clone());
		Some(id)
	}

	/// Persists super properties, automatically attached to every future
	/// event.
	pub fn register(&mut self, properties: Properties) {
		for (key, value) in properties {
			self.storage().set(&key, value);
		}
	}

	/// Persists super properties without overwriting values that were
	/// legitimately set before (first-touch attribution).
	pub fn register_once(&mut self, properties: Properties) {
		for (key, value) in properties {
			self.storage().add(&key, value);
		}
	}

	/// Like [`register_once`](Self::register_once) with a caller-supplied
	/// default sentinel that may be overwritten.
	pub fn register_once_with_default(&mut self, properties: Properties, default: Value) {
		for (key, value) in properties {
			self.storage().add_with_default(&key, value, &default);
		}
	}

	/// Removes a super property.
	pub fn unregister(&mut self, key: &str) {
		self.storage().delete(key);
	}

	/// Reads a persisted super property.
	pub fn get_property(&mut self, key: &str) -> Option<Value> {
		self.storage().get(key).cloned()
	}

	/// Stores a human-readable label for the user.
	pub fn name_tag(&mut self, name: impl Into<String>) {
		self.storage().set("mp_name_tag", name.into());
	}

	/// Asks the remote system to merge the current distinct ID with a
	/// newly known one. Requires an already-resolvable distinct ID: an
	/// alias for a user we have never seen would merge nothing.
	pub fn alias(&mut self, alias: impl Into<String>) -> Dispatch {
		let alias = alias.into();

		if self.get_distinct_id(false).is_none() {
			debug!("alias without a resolvable distinct id, skipping");
			return Dispatch::Skipped(SkipReason::NoDistinctId);
		}

		self.storage().set(ALIAS_KEY, alias.clone());
		self.track("$create_alias", Properties::new().insert("alias", alias))
	}

	/// Tracks an event with an optional set of properties.
	pub fn track(&mut self, event: &str, properties: Properties) -> Dispatch {
		let user_agent = self.client_user_agent();
		if agent::is_blocked(&user_agent) {
			debug!(event, "blocked user agent, not tracking");
			return Dispatch::Skipped(SkipReason::BlockedUserAgent);
		}

		if self.token.is_none() && !properties.contains_key("token") {
			debug!(event, "no project token configured, not tracking");
			return Dispatch::Skipped(SkipReason::MissingToken);
		}

		self.capture_acquisition();

		let caller_supplied_distinct = properties.contains_key("distinct_id");

		// Increasing priority: persisted super properties, computed
		// defaults, caller-supplied properties.
		let supers = self.storage().state();
		let defaults = self.default_properties(&user_agent);
		let mut merged = supers.merge(defaults).merge(properties);

		if !merged.contains_key("token") {
			if let Some(token) = &self.token {
				merged.set("token", token.clone());
			}
		}

		if !merged.contains_key("ip") {
			let ip = self.client_ip();
			if !ip.is_empty() && !is_loopback(&ip) {
				merged.set("ip", ip);
			}
		}

		if !caller_supplied_distinct {
			if let Some(id) = self.distinct_id.clone() {
				merged.set(DISTINCT_ID_KEY, id);
			} else if !merged.contains_key(DISTINCT_ID_KEY) {
				if let Some(id) = self.get_distinct_id(true) {
					merged.set(DISTINCT_ID_KEY, id);
				}
			}
		}

		let payload = EventPayload::new(event, merged.prune_empty());
		let url = match self.endpoint_url(&payload) {
			Ok(url) => url,
			Err(err) => {
				warn!(error = %err, event, "failed to build tracking url");
				return Dispatch::Skipped(SkipReason::InvalidEndpoint);
			}
		};

		if self.transport().request(&url, false).is_sent() {
			debug!(event, "event dispatched");
			Dispatch::Sent
		} else {
			debug!(event, "transport failed, event dropped");
			Dispatch::Skipped(SkipReason::TransportFailed)
		}
	}

	/// Tracks a page view for the given URL, reconstructing an absolute
	/// URL from the request context when the argument is relative or
	/// omitted. Already-absolute URLs pass through verbatim.
	pub fn track_page_view(&mut self, page_url: Option<&str>) -> Dispatch {
		let resolved = match page_url {
			Some(url) if url.contains("://") => Some(url.to_string()),
			Some(path) => self.context.base_url().map(|base| {
				if path.starts_with('/') {
					format!("{base}{path}")
				} else {
					format!("{base}/{path}")
				}
			}),
			None => self.context.current_url(),
		};

		match resolved {
			Some(url) => self.track("mp_page_view", Properties::new().insert("mp_page", url)),
			None => {
				debug!("cannot resolve page url, skipping page view");
				Dispatch::Skipped(SkipReason::UnresolvedPageUrl)
			}
		}
	}

	/// Opportunistically enriches persistent state from the request:
	/// search engine metadata, campaign parameters, initial referrer.
	fn capture_acquisition(&mut self) {
		let referrer = self.context.referrer().map(str::to_string);

		if let Some(referrer) = referrer.as_deref() {
			if let Some(engine) = referrer::search_engine(referrer) {
				let keyword = referrer::search_keyword(referrer, engine);
				self.storage().set("$search_engine", engine.name);
				if let Some(keyword) = keyword {
					self.storage().set("mp_keyword", keyword);
				}
			}
		}

		if self.config.capture_campaign_params {
			for param in CAMPAIGN_PARAMS {
				let value = self.context.query_param(param).map(str::to_string);
				if let Some(value) = value {
					if !value.is_empty() {
						self.storage().add(*param, value);
					}
				}
			}
		}

		if self.config.capture_referrer {
			let initial = referrer
				.clone()
				.unwrap_or_else(|| DIRECT_REFERRER.to_string());
			let domain = referrer
				.as_deref()
				.and_then(referrer::referring_domain)
				.unwrap_or_else(|| DIRECT_REFERRER.to_string());

			self.storage().add("$initial_referrer", initial);
			self.storage().add("$initial_referring_domain", domain);
		}
	}

	fn default_properties(&self, user_agent: &str) -> Properties {
		Properties::new()
			.insert("$os", agent::operating_system(user_agent))
			.insert("$browser", agent::browser(user_agent))
			.insert("$device", agent::device(user_agent))
			.insert("mp_lib", "rust")
	}

	fn endpoint_url(&self, payload: &EventPayload) -> Result<String, AnalyticsError> {
		let data = payload.encode()?;
		let scheme = if self.config.secure { "https" } else { "http" };
		let base = format!("{scheme}://{}/track/", self.config.api_host);

		let mut url =
			Url::parse(&base).map_err(|err| AnalyticsError::InvalidEndpoint(err.to_string()))?;
		url.query_pairs_mut().append_pair("data", &data);
		if self.config.test_mode {
			url.query_pairs_mut().append_pair("test", "1");
		}

		Ok(url.into())
	}
}

fn is_loopback(ip: &str) -> bool {
	ip.parse::<IpAddr>()
		.map(|addr| addr.is_loopback())
		.unwrap_or(false)
}
