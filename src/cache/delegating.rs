//! Store decorator that mirrors full clears into a second cache.

// self
use crate::{
	_prelude::*,
	cache::{
		item::TokenCacheItem,
		key::CacheKey,
		store::{TokenCacheItems, TokenCacheStore},
	},
};

/// Cache that only needs to follow full clears of a primary store.
///
/// Individual writes are never mirrored; the replica is kept in sync on
/// [`TokenCacheStore::remove_all`] only.
pub trait ReplicaCache: Send + Sync {
	/// Drop every entry held by the replica.
	fn clear_all(&self) -> Result<()>;
}
impl<S> ReplicaCache for S
where
	S: TokenCacheStore,
{
	fn clear_all(&self) -> Result<()> {
		self.remove_all()
	}
}

/// Token cache store that forwards everything to `primary` and fans `remove_all` out to `replica`.
#[derive(Debug)]
pub struct DelegatingTokenCacheStore<S, R> {
	primary: S,
	replica: R,
}
impl<S, R> DelegatingTokenCacheStore<S, R>
where
	S: TokenCacheStore,
	R: ReplicaCache,
{
	/// Wrap `primary`, mirroring full clears into `replica`.
	pub fn new(primary: S, replica: R) -> Self {
		Self { primary, replica }
	}

	/// Borrow the primary store.
	pub fn primary(&self) -> &S {
		&self.primary
	}

	/// Borrow the replica.
	pub fn replica(&self) -> &R {
		&self.replica
	}
}
impl<S, R> TokenCacheStore for DelegatingTokenCacheStore<S, R>
where
	S: TokenCacheStore,
	R: ReplicaCache,
{
	fn get(&self, key: &CacheKey) -> Option<TokenCacheItem> {
		self.primary.get(key)
	}

	fn contains(&self, key: &CacheKey) -> bool {
		self.primary.contains(key)
	}

	fn set(&self, key: &CacheKey, item: TokenCacheItem) -> Result<()> {
		self.primary.set(key, item)
	}

	fn remove(&self, key: &CacheKey) -> Result<()> {
		self.primary.remove(key)
	}

	fn remove_all(&self) -> Result<()> {
		self.primary.remove_all()?;

		if let Err(err) = self.replica.clear_all() {
			tracing::warn!(error = %err, "replica cache could not be cleared");

			return Err(err);
		}

		tracing::debug!("primary and replica caches cleared");

		Ok(())
	}

	fn iter_all(&self) -> TokenCacheItems {
		self.primary.iter_all()
	}
}
