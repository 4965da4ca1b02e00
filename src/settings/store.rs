//! Key/value storage for component settings.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::payload::Payload;

/// Storage contract for settings values.
///
/// Stores may be shared between components; implementations must be safe
/// to call from several tasks. Values that are not structured data are
/// stored as given.
pub trait SettingsStore: Send + Sync + 'static {
	/// Returns the value stored under `key`.
	fn get(&self, key: &str) -> Option<Payload>;

	/// Stores `value` under `key`. An existing value is only replaced when
	/// `override_existing` is true.
	fn set(&self, key: &str, value: Payload, override_existing: bool);

	/// Returns the value stored under `key`, or `default`.
	fn get_or(&self, key: &str, default: Payload) -> Payload {
		self.get(key).unwrap_or(default)
	}
}

/// In-memory [`SettingsStore`], the default store of a component.
#[derive(Debug, Default)]
pub struct MemoryStore {
	values: RwLock<HashMap<String, Payload>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of stored keys.
	pub fn len(&self) -> usize {
		self.values
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl SettingsStore for MemoryStore {
	fn get(&self, key: &str) -> Option<Payload> {
		self.values
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.get(key)
			.cloned()
	}

	fn set(&self, key: &str, value: Payload, override_existing: bool) {
		let mut values =
			self.values.write().unwrap_or_else(PoisonError::into_inner);
		if override_existing || !values.contains_key(key) {
			values.insert(key.to_string(), value);
		}
	}
}
