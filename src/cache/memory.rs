//! In-memory token cache store.

// std
use std::{
	collections::HashMap,
	sync::{Mutex, MutexGuard, PoisonError},
};
// crates.io
use serde::{Deserialize, Serialize};
// self
use crate::{
	_prelude::*,
	cache::{
		item::TokenCacheItem,
		key::CacheKey,
		store::{TokenCacheItems, TokenCacheStore, key_label},
	},
};

/// Thread-safe in-memory store.
///
/// One mutex guards the backing map for reads and writes alike.
#[derive(Debug, Default)]
pub struct MemoryTokenCacheStore {
	items: Mutex<HashMap<CacheKey, TokenCacheItem>>,
}
impl MemoryTokenCacheStore {
	/// Create an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Create a store seeded with `items`.
	pub fn from_items(items: HashMap<CacheKey, TokenCacheItem>) -> Self {
		Self { items: Mutex::new(items) }
	}

	/// Clone of the whole backing map.
	pub fn snapshot(&self) -> HashMap<CacheKey, TokenCacheItem> {
		self.lock().clone()
	}

	/// Swap in `items` as the whole backing map.
	pub(crate) fn replace(&self, items: HashMap<CacheKey, TokenCacheItem>) {
		*self.lock() = items;
	}

	/// Number of filed entries.
	pub fn len(&self) -> usize {
		self.lock().len()
	}

	/// Whether the store holds no entries.
	pub fn is_empty(&self) -> bool {
		self.lock().is_empty()
	}

	// Entries are only ever replaced whole, so a poisoned map is still consistent.
	fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, TokenCacheItem>> {
		self.items.lock().unwrap_or_else(PoisonError::into_inner)
	}
}
impl TokenCacheStore for MemoryTokenCacheStore {
	fn get(&self, key: &CacheKey) -> Option<TokenCacheItem> {
		tracing::trace!(key = %key_label(key), "get item from cache");

		self.lock().get(key).cloned()
	}

	fn contains(&self, key: &CacheKey) -> bool {
		self.lock().contains_key(key)
	}

	fn set(&self, key: &CacheKey, item: TokenCacheItem) -> Result<()> {
		tracing::debug!(key = %key_label(key), "set item in cache");

		self.lock().insert(key.clone(), item);

		Ok(())
	}

	fn remove(&self, key: &CacheKey) -> Result<()> {
		tracing::debug!(key = %key_label(key), "remove item from cache");

		self.lock().remove(key);

		Ok(())
	}

	fn remove_all(&self) -> Result<()> {
		tracing::debug!("remove all items from cache");

		self.lock().clear();

		Ok(())
	}

	fn iter_all(&self) -> TokenCacheItems {
		self.lock().values().cloned().collect::<Vec<_>>().into_iter()
	}
}
impl Serialize for MemoryTokenCacheStore {
	fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		self.lock().serialize(serializer)
	}
}
impl<'de> Deserialize<'de> for MemoryTokenCacheStore {
	fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		HashMap::deserialize(deserializer).map(Self::from_items)
	}
}
