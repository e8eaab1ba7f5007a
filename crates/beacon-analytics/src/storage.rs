// Copyright (c) 2025 the beacon authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! Per-user persistent state.
//!
//! A [`StateStore`] tracks a user's identity and registered super
//! properties across requests. It is scoped to one (project, user) pair,
//! loads its state lazily from a pluggable [`StorageBackend`], caches it
//! in memory for the rest of the request, and flushes back to the backend
//! whenever a mutating call actually changes something. Durability lives
//! entirely in the backend; the store itself is request-scoped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use beacon_analytics_core::{Properties, RESERVED_PREFIX};

/// Key under which the user's distinct ID is persisted.
pub const DISTINCT_ID_KEY: &str = "distinct_id";

/// Reserved key marking a pending alias; never leaves the store.
pub const ALIAS_KEY: &str = "__alias";

/// Default validity window for persisted state: one year, in seconds.
pub const DEFAULT_LIFETIME_SECS: u64 = 31_536_000;

/// Sentinel default for [`StateStore::add`]: a value equal to this may be
/// overwritten, anything else is considered legitimately set.
pub const ADD_DEFAULT: &str = "None";

/// A persistence medium for per-user state: a cookie, a remote cache, a
/// file, or an in-process map.
pub trait StorageBackend: std::fmt::Debug {
	/// Reads the raw blob stored under the given key, if any.
	fn load(&self, storage_key: &str) -> Option<String>;

	/// Writes the raw blob under the given key with the given validity.
	fn persist(&mut self, storage_key: &str, blob: &str, lifetime_secs: u64);

	/// Derives the default storage key for a (project, user) pair.
	fn default_storage_key(&self, project_token: Option<&str>, user_key: Option<&str>) -> String {
		format!(
			"beacon:{}:{}",
			project_token.unwrap_or(""),
			user_key.unwrap_or("")
		)
	}

	/// Outbound response headers queued by this backend, if it writes any.
	fn pending_headers(&self) -> &[String] {
		&[]
	}
}

/// Key/value state for one user, backed by a pluggable persistence medium.
#[derive(Debug)]
pub struct StateStore {
	backend: Box<dyn StorageBackend>,
	project_token: Option<String>,
	user_key: Option<String>,
	storage_key: Option<String>,
	lifetime_secs: u64,
	state: Option<Map<String, Value>>,
}

impl StateStore {
	/// Creates a store on top of the given backend.
	pub fn new(backend: Box<dyn StorageBackend>) -> Self {
		Self {
			backend,
			project_token: None,
			user_key: None,
			storage_key: None,
			lifetime_secs: DEFAULT_LIFETIME_SECS,
			state: None,
		}
	}

	/// Creates a store backed by a process-local map. Handy for tests and
	/// for server-side sessions with no response channel.
	pub fn in_memory() -> Self {
		Self::new(Box::new(MemoryBackend::new()))
	}

	/// Sets the project the state is scoped to.
	pub fn set_project_token(&mut self, token: impl Into<String>) {
		self.project_token = Some(token.into());
	}

	/// Sets the user the state is scoped to.
	///
	/// Unless the new key matches the stored distinct ID or a pending
	/// alias, any alias marker is cleared and the distinct ID is
	/// overwritten. This guards against double-identification: an already
	/// aliased or identified user keeps their stored state.
	pub fn set_user_key(&mut self, key: impl Into<String>) {
		let key = key.into();
		let key_value = Value::String(key.clone());

		// Assign before the first state access: the storage key is derived
		// from (project, user) on first load.
		self.user_key = Some(key.clone());

		let already_identified =
			self.get(DISTINCT_ID_KEY) == Some(&key_value) || self.get(ALIAS_KEY) == Some(&key_value);

		if !already_identified {
			self.delete(ALIAS_KEY);
			self.set(DISTINCT_ID_KEY, key);
		}
	}

	/// Overrides the derived storage key.
	pub fn set_storage_key(&mut self, key: impl Into<String>) {
		self.storage_key = Some(key.into());
	}

	/// The key state is persisted under; derived from project token and
	/// user key on first use unless explicitly set.
	pub fn storage_key(&mut self) -> &str {
		if self.storage_key.is_none() {
			let derived = self
				.backend
				.default_storage_key(self.project_token.as_deref(), self.user_key.as_deref());
			self.storage_key = Some(derived);
		}

		self.storage_key.as_deref().unwrap_or_default()
	}

	/// Sets how long persisted state stays valid, in seconds.
	pub fn set_lifetime(&mut self, seconds: u64) {
		self.lifetime_secs = seconds;
	}

	pub fn lifetime(&self) -> u64 {
		self.lifetime_secs
	}

	/// Stores `value` under `key`, flushing to the backend only when the
	/// value actually changed. Idempotent writes are free.
	pub fn set(&mut self, key: &str, value: impl Into<Value>) {
		let value = value.into();
		self.ensure_loaded();

		if self.get(key) != Some(&value) {
			if let Some(state) = self.state.as_mut() {
				state.insert(key.to_string(), value);
			}
			self.store_state();
		}
	}

	/// First-touch write: stores `value` only when the key is absent or the
	/// current value equals the `"None"` sentinel. A genuinely different
	/// existing value is never overwritten.
	pub fn add(&mut self, key: &str, value: impl Into<Value>) {
		self.add_with_default(key, value, &Value::String(ADD_DEFAULT.to_string()));
	}

	/// Like [`add`](Self::add) with a caller-supplied default sentinel.
	pub fn add_with_default(&mut self, key: &str, value: impl Into<Value>, default: &Value) {
		let value = value.into();
		self.ensure_loaded();

		let current = self.get(key);
		if current == Some(&value) {
			return;
		}

		if current.is_none() || current == Some(default) {
			if let Some(state) = self.state.as_mut() {
				state.insert(key.to_string(), value);
			}
			self.store_state();
		}
	}

	/// Returns the stored value for `key`, if any.
	pub fn get(&mut self, key: &str) -> Option<&Value> {
		self.ensure_loaded();
		self.state.as_ref().and_then(|state| state.get(key))
	}

	/// Removes `key`, flushing if it was present.
	pub fn delete(&mut self, key: &str) {
		self.ensure_loaded();

		let removed = self
			.state
			.as_mut()
			.map(|state| state.remove(key).is_some())
			.unwrap_or(false);

		if removed {
			self.store_state();
		}
	}

	/// A snapshot of the state with reserved (`__`-prefixed) keys filtered
	/// out, even if the persisted blob contained them.
	pub fn state(&mut self) -> Properties {
		self.ensure_loaded();
		let map = self.state.clone().unwrap_or_default();
		Properties::from(map).without_reserved()
	}

	/// Commits the externally-visible state to the backend. Reserved keys
	/// stay in memory only; they never reach the persistence medium.
	pub fn store_state(&mut self) {
		self.ensure_loaded();
		let key = self.storage_key().to_string();

		let visible: Map<String, Value> = self
			.state
			.as_ref()
			.map(|state| {
				state
					.iter()
					.filter(|(k, _)| !k.starts_with(RESERVED_PREFIX))
					.map(|(k, v)| (k.clone(), v.clone()))
					.collect()
			})
			.unwrap_or_default();

		match serde_json::to_string(&visible) {
			Ok(blob) => self.backend.persist(&key, &blob, self.lifetime_secs),
			Err(err) => warn!(error = %err, "failed to serialize state, skipping flush"),
		}
	}

	/// Outbound response headers queued by the backend (e.g. `Set-Cookie`).
	pub fn pending_headers(&self) -> &[String] {
		self.backend.pending_headers()
	}

	/// Loads state from the backend at most once per instance. A corrupt
	/// or unparseable blob fails soft and is treated as empty state.
	fn ensure_loaded(&mut self) {
		if self.state.is_some() {
			return;
		}

		let key = self.storage_key().to_string();
		let state = match self.backend.load(&key) {
			Some(blob) => match serde_json::from_str::<Value>(&blob) {
				Ok(Value::Object(map)) => map,
				Ok(_) | Err(_) => {
					debug!(storage_key = %key, "persisted state unreadable, starting empty");
					Map::new()
				}
			},
			None => Map::new(),
		};

		self.state = Some(state);
	}
}

/// In-process backend with a shared handle: clones see the same entries,
/// so a reloaded store observes earlier flushes.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
	entries: Arc<Mutex<HashMap<String, String>>>,
	persists: Arc<AtomicUsize>,
}

impl MemoryBackend {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of persist calls this backend has seen.
	pub fn persist_count(&self) -> usize {
		self.persists.load(Ordering::SeqCst)
	}

	/// Reads the raw stored blob, bypassing the store.
	pub fn raw(&self, storage_key: &str) -> Option<String> {
		self.entries
			.lock()
			.ok()
			.and_then(|entries| entries.get(storage_key).cloned())
	}

	/// Seeds a raw blob, bypassing the store.
	pub fn seed(&self, storage_key: impl Into<String>, blob: impl Into<String>) {
		if let Ok(mut entries) = self.entries.lock() {
			entries.insert(storage_key.into(), blob.into());
		}
	}
}

impl StorageBackend for MemoryBackend {
	fn load(&self, storage_key: &str) -> Option<String> {
		self.raw(storage_key)
	}

	fn persist(&mut self, storage_key: &str, blob: &str, _lifetime_secs: u64) {
		self.persists.fetch_add(1, Ordering::SeqCst);
		if let Ok(mut entries) = self.entries.lock() {
			entries.insert(storage_key.to_string(), blob.to_string());
		}
	}
}

/// Backend that stores nothing. Use for server events that should not be
/// tied to a persistent user.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBackend;

impl NullBackend {
	pub fn new() -> Self {
		Self
	}
}

impl StorageBackend for NullBackend {
	fn load(&self, _storage_key: &str) -> Option<String> {
		None
	}

	fn persist(&mut self, _storage_key: &str, _blob: &str, _lifetime_secs: u64) {}
}
