//! On-disk token cache snapshots.

// std
use std::{fs, time::Duration};
// crates.io
use chrono::{TimeDelta, Utc};
use identity_cache::{
	CacheKey, DelegatingTokenCacheStore, Error, FileTokenCacheStore, MemoryTokenCacheStore, Result,
	TokenCacheItem, TokenCacheQuery, TokenCacheStore, TokenEntryKind, TokenRequest, TokenResponse,
	UserInfo,
};

const AUTHORITY: &str = "https://login.windows.net/contoso.onmicrosoft.com";
const CLIENT_ID: &str = "4e4f2a7c-cd7b-4b56-9d91-2a8b7c5a3e11";

fn response(user_id: &str, expires_in: TimeDelta) -> TokenResponse {
	TokenResponse {
		access_token: Some("access".into()),
		refresh_token: Some("refresh".into()),
		expires_on: Some(Utc::now() + expires_in),
		is_multi_resource_refresh_token: true,
		tenant_id: Some("contoso".into()),
		family_client_id: Some("1".into()),
		user_info: Some(UserInfo::with_user_id(user_id)),
		..TokenResponse::default()
	}
}

fn file_items(store: &impl TokenCacheStore, user_id: &str) -> Result<()> {
	let response = response(user_id, TimeDelta::hours(1));
	let request = TokenRequest::new(AUTHORITY, "https://graph.windows.net", CLIENT_ID);
	let regular = TokenCacheItem::regular(AUTHORITY, &request.resource, CLIENT_ID, &response)?;
	let multi_resource = TokenCacheItem::multi_resource(AUTHORITY, CLIENT_ID, &response)?;
	let family = TokenCacheItem::family(AUTHORITY, &response)?;

	store.set(&CacheKey::for_request(&request, Some(user_id))?, regular)?;
	store.set(
		&CacheKey::for_multi_resource_refresh_token(AUTHORITY, CLIENT_ID, Some(user_id))?,
		multi_resource,
	)?;
	store.set(&CacheKey::for_family_refresh_token(AUTHORITY, "1", Some(user_id))?, family)?;

	Ok(())
}

#[test]
fn snapshot_survives_reopen() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let dir = tempfile::tempdir()?;
	let path = dir.path().join("tokens.json");

	{
		let store = FileTokenCacheStore::open(&path)?;

		file_items(&store, "alice")?;
		file_items(&store, "bob")?;

		assert_eq!(store.len(), 6);
	}

	let store = FileTokenCacheStore::open(&path)?;
	let request = TokenRequest::new(AUTHORITY, "https://graph.windows.net", CLIENT_ID);
	let regular =
		store.get(&CacheKey::for_request(&request, Some("alice"))?).expect("regular entry");

	assert_eq!(store.len(), 6);
	assert_eq!(regular.entry_kind(), TokenEntryKind::Regular);
	assert_eq!(regular.access_token.as_deref(), Some("access"));
	assert!(store.contains(&CacheKey::for_family_refresh_token(AUTHORITY, "1", Some("bob"))?));
	assert_eq!(store.unique_users().len(), 2);
	assert_eq!(store.tokens_for_resource("https://graph.windows.net").len(), 2);
	assert!(store.tokens_about_to_expire(Utc::now(), Duration::from_secs(300)).is_empty());

	store.clear_tokens_for_user("ALICE")?;

	assert_eq!(FileTokenCacheStore::open(&path)?.tokens_for_user("alice").len(), 0);
	assert_eq!(FileTokenCacheStore::open(&path)?.len(), 3);

	Ok(())
}

#[test]
fn unreadable_snapshot_is_reported() -> Result<()> {
	let dir = tempfile::tempdir()?;
	let path = dir.path().join("tokens.json");

	fs::write(&path, b"{ not json")?;

	let err = FileTokenCacheStore::open(&path).expect_err("corrupt snapshot");

	assert!(matches!(err, Error::CorruptCache { .. }), "{err}");
	// The broken file stays in place for inspection.
	assert_eq!(fs::read(&path)?, b"{ not json");

	Ok(())
}

#[cfg(unix)]
#[test]
fn snapshot_is_private_to_the_owner() -> Result<()> {
	// std
	use std::os::unix::fs::PermissionsExt;

	let dir = tempfile::tempdir()?;
	let path = dir.path().join("tokens.json");
	let store = FileTokenCacheStore::open(&path)?;

	file_items(&store, "alice")?;

	assert_eq!(fs::metadata(&path)?.permissions().mode() & 0o777, 0o600);

	Ok(())
}

#[test]
fn clearing_a_delegating_store_clears_the_replica() -> Result<()> {
	let dir = tempfile::tempdir()?;
	let path = dir.path().join("tokens.json");
	let replica = MemoryTokenCacheStore::new();

	file_items(&replica, "carol")?;

	let store = DelegatingTokenCacheStore::new(FileTokenCacheStore::open(&path)?, replica);

	file_items(&store, "alice")?;

	assert_eq!(store.primary().len(), 3);
	assert_eq!(store.replica().len(), 3);

	store.remove_all()?;

	assert!(store.primary().is_empty());
	assert!(store.replica().is_empty());
	assert!(FileTokenCacheStore::open(&path)?.is_empty());

	Ok(())
}
