//! Write-through persisted token cache store.
//!
//! The store keeps a [`MemoryTokenCacheStore`] and rewrites the whole snapshot file on every
//! mutation. A mutation reaches memory only after its snapshot is on disk. Reads never touch the
//! disk.

// std
use std::{
	collections::HashMap,
	ffi::OsString,
	fs::{self, File, OpenOptions},
	io::{ErrorKind, Write},
	path::{Path, PathBuf},
	sync::{Mutex, PoisonError},
};
// crates.io
use serde::{Deserialize, Serialize};
// self
use crate::{
	_prelude::*,
	cache::{
		item::TokenCacheItem,
		key::CacheKey,
		memory::MemoryTokenCacheStore,
		store::{TokenCacheItems, TokenCacheStore},
	},
};

/// Version tag written into every snapshot.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Token cache store persisted to a single snapshot file.
#[derive(Debug)]
pub struct FileTokenCacheStore {
	path: PathBuf,
	memory: MemoryTokenCacheStore,
	// Serializes snapshot writes; distinct from the in-memory map lock.
	write_lock: Mutex<()>,
}
impl FileTokenCacheStore {
	/// Open the store backed by `path`, loading any existing snapshot.
	///
	/// A missing file yields an empty store. A file that cannot be read or decoded fails with
	/// [`Error::CorruptCache`] instead of silently starting empty.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
		let path = path.into();

		if path.file_name().is_none() {
			return Err(Error::invalid_argument("path", "Must name a file."));
		}

		let memory = load_snapshot(&path)?;

		Ok(Self { path, memory, write_lock: Mutex::new(()) })
	}

	/// Location of the snapshot file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Number of filed entries.
	pub fn len(&self) -> usize {
		self.memory.len()
	}

	/// Whether the store holds no entries.
	pub fn is_empty(&self) -> bool {
		self.memory.is_empty()
	}

	// Applies `change` to a copy of the entries, writes that copy, then swaps it into memory.
	fn commit<F>(&self, change: F) -> Result<()>
	where
		F: FnOnce(&mut HashMap<CacheKey, TokenCacheItem>),
	{
		let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
		let mut items = self.memory.snapshot();

		change(&mut items);
		self.write_snapshot(&items)?;
		self.memory.replace(items);

		Ok(())
	}

	fn write_snapshot(&self, items: &HashMap<CacheKey, TokenCacheItem>) -> Result<()> {
		let bytes = serde_json::to_vec(&SnapshotRef { version: SNAPSHOT_VERSION, items })?;
		let staging = staging_path(&self.path);
		let written = create_private(&staging).and_then(|mut file| {
			file.write_all(&bytes)?;
			file.sync_all()
		});

		if let Err(err) = written.and_then(|_| fs::rename(&staging, &self.path)) {
			tracing::warn!(path = ?self.path, error = %err, "token cache snapshot not written");

			let _ = fs::remove_file(&staging);

			return Err(err.into());
		}

		tracing::trace!(path = ?self.path, bytes = bytes.len(), "token cache snapshot written");

		Ok(())
	}
}
impl TokenCacheStore for FileTokenCacheStore {
	fn get(&self, key: &CacheKey) -> Option<TokenCacheItem> {
		self.memory.get(key)
	}

	fn contains(&self, key: &CacheKey) -> bool {
		self.memory.contains(key)
	}

	fn set(&self, key: &CacheKey, item: TokenCacheItem) -> Result<()> {
		self.commit(|items| {
			items.insert(key.clone(), item);
		})
	}

	fn remove(&self, key: &CacheKey) -> Result<()> {
		self.commit(|items| {
			items.remove(key);
		})
	}

	fn remove_all(&self) -> Result<()> {
		self.commit(HashMap::clear)
	}

	fn iter_all(&self) -> TokenCacheItems {
		self.memory.iter_all()
	}
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
	version: u32,
	items: &'a HashMap<CacheKey, TokenCacheItem>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Snapshot {
	version: u32,
	items: MemoryTokenCacheStore,
}

fn load_snapshot(path: &Path) -> Result<MemoryTokenCacheStore> {
	let bytes = match fs::read(path) {
		Ok(bytes) => bytes,
		Err(err) if err.kind() == ErrorKind::NotFound => {
			tracing::debug!(?path, "no token cache snapshot; starting empty");

			return Ok(MemoryTokenCacheStore::new());
		},
		Err(err) => return Err(corrupt(path, err)),
	};
	let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|err| corrupt(path, err))?;

	if snapshot.version != SNAPSHOT_VERSION {
		return Err(corrupt(
			path,
			format!("unsupported snapshot version {} (expected {SNAPSHOT_VERSION})", snapshot.version),
		));
	}

	tracing::debug!(?path, items = snapshot.items.len(), "token cache snapshot loaded");

	Ok(snapshot.items)
}

// Sibling of the target with `.tmp` appended to the full file name.
fn staging_path(path: &Path) -> PathBuf {
	let mut name = path.file_name().map(OsString::from).unwrap_or_default();

	name.push(".tmp");

	path.with_file_name(name)
}

fn corrupt(path: &Path, reason: impl std::fmt::Display) -> Error {
	tracing::error!(?path, %reason, "token cache snapshot cannot be loaded");

	Error::CorruptCache { path: path.to_path_buf(), reason: reason.to_string() }
}

fn create_private(path: &Path) -> std::io::Result<File> {
	let mut options = OpenOptions::new();

	options.create(true).truncate(true).write(true);

	#[cfg(unix)]
	{
		use std::os::unix::fs::OpenOptionsExt;

		options.mode(0o600);
	}

	options.open(path)
}

#[cfg(test)]
mod tests {
	// crates.io
	use tempfile::TempDir;
	// self
	use super::*;
	use crate::cache::item::{TokenResponse, UserInfo};

	fn entry() -> (CacheKey, TokenCacheItem) {
		let response = TokenResponse {
			access_token: Some("access".into()),
			refresh_token: Some("refresh".into()),
			expires_on: Some(Utc::now()),
			tenant_id: Some("tenant".into()),
			user_info: Some(UserInfo::with_user_id("user@contoso.com")),
			..TokenResponse::default()
		};
		let item = TokenCacheItem::regular(
			"https://login.windows.net/contoso.onmicrosoft.com",
			"https://graph.windows.net",
			"client",
			&response,
		)
		.expect("item");

		(CacheKey::for_item(&item).expect("key"), item)
	}

	#[test]
	fn reopened_store_returns_an_equal_entry() {
		let dir = TempDir::new().expect("tempdir");
		let path = dir.path().join("tokens.json");
		let (key, item) = entry();

		{
			let store = FileTokenCacheStore::open(&path).expect("open");

			assert!(store.is_empty());

			store.set(&key, item.clone()).expect("set");
		}

		let reopened = FileTokenCacheStore::open(&path).expect("reopen");

		assert_eq!(reopened.get(&key), Some(item));
	}

	#[test]
	fn removals_are_persisted() {
		let dir = TempDir::new().expect("tempdir");
		let path = dir.path().join("tokens.json");
		let (key, item) = entry();
		let store = FileTokenCacheStore::open(&path).expect("open");

		store.set(&key, item).expect("set");
		store.remove(&key).expect("remove");

		assert!(FileTokenCacheStore::open(&path).expect("reopen").is_empty());
	}

	#[test]
	fn failed_writes_leave_memory_untouched() {
		let dir = TempDir::new().expect("tempdir");
		let parent = dir.path().join("missing");
		let path = parent.join("tokens.json");
		let (key, item) = entry();
		let store = FileTokenCacheStore::open(&path).expect("open");

		assert!(matches!(store.set(&key, item.clone()), Err(Error::Io(_))));
		assert_eq!(store.get(&key), None);
		assert!(store.is_empty());

		fs::create_dir(&parent).expect("mkdir");
		store.set(&key, item).expect("set");
		fs::remove_file(&path).expect("rm snapshot");
		fs::remove_dir(&parent).expect("rmdir");

		assert!(store.remove_all().is_err());
		assert!(store.contains(&key));
	}

	#[test]
	fn snapshots_stage_next_to_their_full_file_name() {
		let dir = TempDir::new().expect("tempdir");
		let json_path = dir.path().join("tokens.json");
		let bin_path = dir.path().join("tokens.bin");

		assert_eq!(staging_path(&json_path), dir.path().join("tokens.json.tmp"));
		assert_eq!(staging_path(&dir.path().join("tokens.tmp")), dir.path().join("tokens.tmp.tmp"));

		let (key, item) = entry();
		let json = FileTokenCacheStore::open(&json_path).expect("open");
		let bin = FileTokenCacheStore::open(&bin_path).expect("open");

		json.set(&key, item.clone()).expect("set");
		bin.set(&key, item).expect("set");

		assert!(!staging_path(&json_path).exists());
		assert_eq!(FileTokenCacheStore::open(&json_path).expect("reopen").len(), 1);
		assert_eq!(FileTokenCacheStore::open(&bin_path).expect("reopen").len(), 1);
	}

	#[test]
	fn corrupt_or_foreign_snapshots_fail_construction() {
		let dir = TempDir::new().expect("tempdir");
		let path = dir.path().join("tokens.json");

		fs::write(&path, b"\x00\x01 not json").expect("write");

		assert!(matches!(FileTokenCacheStore::open(&path), Err(Error::CorruptCache { .. })));

		fs::write(&path, br#"["a", "list", "is", "the", "wrong", "shape"]"#).expect("write");

		assert!(matches!(FileTokenCacheStore::open(&path), Err(Error::CorruptCache { .. })));

		fs::write(&path, br#"{ "version": 99, "items": {} }"#).expect("write");

		assert!(matches!(FileTokenCacheStore::open(&path), Err(Error::CorruptCache { .. })));
	}
}
