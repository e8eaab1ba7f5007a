// Copyright (c) 2025 the beacon authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! Property map attached to tracked events and persisted per user.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys starting with this prefix are internal bookkeeping and are never
/// exposed in state snapshots or event payloads built from them.
pub const RESERVED_PREFIX: &str = "__";

/// An ordered string-to-JSON map of event or super properties.
///
/// # Example
///
/// ```
/// use beacon_analytics_core::Properties;
///
/// let props = Properties::new()
///     .insert("button_name", "checkout")
///     .insert("page", "/cart")
///     .insert("price", 99.99)
///     .insert("is_premium", true);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties {
	inner: Map<String, Value>,
}

impl Properties {
	/// Creates an empty property map.
	pub fn new() -> Self {
		Self { inner: Map::new() }
	}

	/// Inserts a key-value pair, builder style.
	///
	/// The value can be any type that converts into `serde_json::Value`:
	/// strings, numbers, booleans, arrays or nested objects.
	pub fn insert<K, V>(mut self, key: K, value: V) -> Self
	where
		K: Into<String>,
		V: Into<Value>,
	{
		self.inner.insert(key.into(), value.into());
		self
	}

	/// Inserts a key-value pair in place.
	pub fn set<K, V>(&mut self, key: K, value: V)
	where
		K: Into<String>,
		V: Into<Value>,
	{
		self.inner.insert(key.into(), value.into());
	}

	/// Gets a value by key.
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.inner.get(key)
	}

	/// Returns true if the key is present.
	pub fn contains_key(&self, key: &str) -> bool {
		self.inner.contains_key(key)
	}

	/// Removes a key, returning its previous value if any.
	pub fn remove(&mut self, key: &str) -> Option<Value> {
		self.inner.remove(key)
	}

	/// Returns true if there are no properties.
	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	/// Returns the number of properties.
	pub fn len(&self) -> usize {
		self.inner.len()
	}

	/// Merges another property map into this one.
	///
	/// If both contain the same key, the value from `other` takes precedence.
	pub fn merge(mut self, other: Properties) -> Self {
		for (k, v) in other.inner {
			self.inner.insert(k, v);
		}
		self
	}

	/// Returns a copy with reserved (`__`-prefixed) keys removed.
	pub fn without_reserved(&self) -> Properties {
		let inner = self
			.inner
			.iter()
			.filter(|(key, _)| !key.starts_with(RESERVED_PREFIX))
			.map(|(key, value)| (key.clone(), value.clone()))
			.collect();
		Self { inner }
	}

	/// Drops properties whose value carries no information: null, `false`,
	/// empty strings, zero, and empty arrays or objects.
	pub fn prune_empty(mut self) -> Self {
		self.inner.retain(|_, value| !is_empty_value(value));
		self
	}

	/// Iterates over the key-value pairs.
	pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
		self.inner.iter()
	}

	/// Converts the properties into a `serde_json::Value`.
	pub fn into_value(self) -> Value {
		Value::Object(self.inner)
	}
}

fn is_empty_value(value: &Value) -> bool {
	match value {
		Value::Null => true,
		Value::Bool(b) => !b,
		Value::String(s) => s.is_empty(),
		Value::Number(n) => n.as_f64() == Some(0.0),
		Value::Array(a) => a.is_empty(),
		Value::Object(o) => o.is_empty(),
	}
}

impl From<Properties> for Value {
	fn from(props: Properties) -> Self {
		props.into_value()
	}
}

impl From<Value> for Properties {
	fn from(value: Value) -> Self {
		match value {
			Value::Object(map) => Self { inner: map },
			_ => Self::new(),
		}
	}
}

impl From<Map<String, Value>> for Properties {
	fn from(map: Map<String, Value>) -> Self {
		Self { inner: map }
	}
}

impl FromIterator<(String, Value)> for Properties {
	fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
		Self {
			inner: iter.into_iter().collect(),
		}
	}
}

impl IntoIterator for Properties {
	type Item = (String, Value);
	type IntoIter = serde_json::map::IntoIter;

	fn into_iter(self) -> Self::IntoIter {
		self.inner.into_iter()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn new_is_empty() {
		let props = Properties::new();
		assert!(props.is_empty());
		assert_eq!(props.len(), 0);
	}

	#[test]
	fn insert_and_get() {
		let props = Properties::new().insert("name", "Alice").insert("age", 30);
		assert_eq!(props.get("name"), Some(&Value::String("Alice".to_string())));
		assert_eq!(props.get("age"), Some(&Value::Number(30.into())));
	}

	#[test]
	fn set_overwrites_in_place() {
		let mut props = Properties::new().insert("plan", "free");
		props.set("plan", "pro");
		assert_eq!(props.get("plan"), Some(&Value::String("pro".to_string())));
		assert_eq!(props.len(), 1);
	}

	#[test]
	fn merge_right_hand_wins() {
		let left = Properties::new().insert("a", 1).insert("b", 2);
		let right = Properties::new().insert("b", 20).insert("c", 3);

		let merged = left.merge(right);

		assert_eq!(merged.len(), 3);
		assert_eq!(merged.get("a"), Some(&Value::Number(1.into())));
		assert_eq!(merged.get("b"), Some(&Value::Number(20.into())));
		assert_eq!(merged.get("c"), Some(&Value::Number(3.into())));
	}

	#[test]
	fn without_reserved_filters_prefixed_keys() {
		let props = Properties::new()
			.insert("__alias", "u-123")
			.insert("distinct_id", "u-456")
			.insert("plan", "pro");

		let visible = props.without_reserved();

		assert!(visible.get("__alias").is_none());
		assert_eq!(visible.len(), 2);
		// The original map is untouched
		assert!(props.contains_key("__alias"));
	}

	#[test]
	fn prune_empty_drops_falsy_values() {
		let props = Properties::new()
			.insert("empty_string", "")
			.insert("null", Value::Null)
			.insert("zero", 0)
			.insert("off", false)
			.insert("empty_list", Value::Array(vec![]))
			.insert("kept", "value")
			.insert("kept_number", 42)
			.prune_empty();

		assert_eq!(props.len(), 2);
		assert!(props.contains_key("kept"));
		assert!(props.contains_key("kept_number"));
	}

	#[test]
	fn from_non_object_value_is_empty() {
		let props = Properties::from(Value::String("not an object".to_string()));
		assert!(props.is_empty());
	}

	proptest! {
		#[test]
		fn len_matches_unique_insertions(keys in proptest::collection::vec("[a-z]{1,10}", 0..20)) {
			let unique: std::collections::HashSet<_> = keys.iter().cloned().collect();
			let mut props = Properties::new();
			for key in &keys {
				props = props.insert(key.clone(), "value");
			}
			prop_assert_eq!(props.len(), unique.len());
		}

		#[test]
		fn without_reserved_never_leaks_prefix(keys in proptest::collection::vec("(__)?[a-z]{1,8}", 0..20)) {
			let mut props = Properties::new();
			for key in &keys {
				props = props.insert(key.clone(), 1);
			}
			let visible = props.without_reserved();
			prop_assert!(visible.iter().all(|(k, _)| !k.starts_with(RESERVED_PREFIX)));
		}

		#[test]
		fn serde_roundtrip(key in "[a-z]{1,20}", value in "[a-zA-Z0-9]{1,50}") {
			let props = Properties::new().insert(key.clone(), value.clone());
			let json = serde_json::to_string(&props).unwrap();
			let parsed: Properties = serde_json::from_str(&json).unwrap();
			prop_assert_eq!(parsed.get(&key), Some(&Value::String(value)));
		}
	}
}
