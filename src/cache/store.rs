//! Token cache store capability set and the query helpers built on top of it.

// std
use std::{collections::HashSet, vec::IntoIter};
// self
use crate::{
	_prelude::*,
	cache::{item::TokenCacheItem, key::CacheKey},
	config::Settings,
	security,
};

/// Finite, restartable sequence of cached entries captured at call time.
pub type TokenCacheItems = IntoIter<TokenCacheItem>;

/// Pluggable storage for token cache entries keyed by [`CacheKey`].
///
/// Implementations must be safe to share across threads; each call observes and mutates a
/// consistent view of the whole store.
pub trait TokenCacheStore: Send + Sync {
	/// Fetch the entry filed under `key`.
	fn get(&self, key: &CacheKey) -> Option<TokenCacheItem>;

	/// Whether an entry is filed under `key`.
	fn contains(&self, key: &CacheKey) -> bool;

	/// File `item` under `key`, replacing any previous entry.
	fn set(&self, key: &CacheKey, item: TokenCacheItem) -> Result<()>;

	/// Remove the entry filed under `key`, if any.
	fn remove(&self, key: &CacheKey) -> Result<()>;

	/// Remove every entry.
	fn remove_all(&self) -> Result<()>;

	/// Snapshot of every entry; a fresh call re-reads current state.
	fn iter_all(&self) -> TokenCacheItems;
}

/// Queries over any [`TokenCacheStore`].
pub trait TokenCacheQuery: TokenCacheStore {
	/// Unique ids of every user with a cached entry.
	fn unique_users(&self) -> HashSet<String> {
		self.iter_all().filter_map(|item| item.user_id().map(str::to_owned)).collect()
	}

	/// Entries scoped to `resource`; multi-resource and family entries never match.
	fn tokens_for_resource(&self, resource: &str) -> Vec<TokenCacheItem> {
		self.iter_all().filter(|item| item.resource.as_deref() == Some(resource)).collect()
	}

	/// Entries issued to `user_id`, compared case-insensitively.
	fn tokens_for_user(&self, user_id: &str) -> Vec<TokenCacheItem> {
		let user_id = user_id.to_lowercase();

		self.iter_all()
			.filter(|item| item.user_id().map(|id| id.to_lowercase() == user_id).unwrap_or(false))
			.collect()
	}

	/// Remove every entry issued to `user_id`.
	///
	/// Entries whose key cannot be re-derived are skipped.
	fn clear_tokens_for_user(&self, user_id: &str) -> Result<()> {
		for item in self.tokens_for_user(user_id) {
			match CacheKey::for_item(&item) {
				Ok(key) => self.remove(&key)?,
				Err(err) => {
					tracing::warn!(error = %err, "skipping cache entry without a derivable key");
				},
			}
		}

		Ok(())
	}

	/// Entries that expire within `buffer` of `now`.
	fn tokens_about_to_expire(&self, now: DateTime<Utc>, buffer: Duration) -> Vec<TokenCacheItem> {
		self.iter_all()
			.filter(|item| item.expires_on.is_some() && item.is_expired_at(now, buffer))
			.collect()
	}

	/// Entries that expire within the configured [`Settings::expiration_buffer`] of now.
	fn expiring_tokens(&self, settings: &Settings) -> Vec<TokenCacheItem> {
		self.tokens_about_to_expire(Utc::now(), settings.expiration_buffer)
	}
}
impl<S> TokenCacheQuery for S where S: TokenCacheStore + ?Sized {}

/// Log-safe label of a cache key.
pub(crate) fn key_label(key: &CacheKey) -> String {
	security::fingerprint(key.as_str())
}
