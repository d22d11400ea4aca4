//! Canonical cache key derivation.
//!
//! Keys have the shape `authority$resource$clientId$[y|n]$userId`. The authority is lower-cased with
//! a single trailing `/` removed, the client and user ids are lower-cased, and the resource and user
//! segments are left empty when absent. Multi-resource refresh tokens never carry a resource and are
//! flagged `y`, so they cannot collide with the per-resource key of the same request. Family refresh
//! tokens append a sixth `foci-<familyClientId>` segment.
//!
//! Persisted caches depend on this exact format; do not reorder segments.

// std
use std::fmt::{Display, Formatter, Result as FmtResult};
// crates.io
use serde::{Deserialize, Serialize};
// self
use crate::{
	_prelude::*,
	cache::item::{TokenCacheItem, TokenEntryKind},
};

/// Segment delimiter.
pub const DELIMITER: &str = "$";
/// Prefix applied to the family client id segment of family refresh token keys.
pub const FAMILY_PREFIX: &str = "foci-";

/// Attributes of a token request that select its cache entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenRequest {
	/// Authority URL the token is requested from.
	pub authority: String,
	/// Resource the access token is scoped to.
	pub resource: String,
	/// Client application id.
	pub client_id: String,
}
impl TokenRequest {
	/// Describe a token request.
	pub fn new(
		authority: impl Into<String>,
		resource: impl Into<String>,
		client_id: impl Into<String>,
	) -> Self {
		Self { authority: authority.into(), resource: resource.into(), client_id: client_id.into() }
	}
}

/// Canonical string key under which a token cache item is filed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);
impl CacheKey {
	/// Build a key from raw request attributes.
	///
	/// Fails when `authority` or `client_id` is blank, or when `resource` is blank for an entry that
	/// is not a multi-resource refresh token. The resource is ignored for multi-resource entries.
	pub fn new(
		authority: &str,
		resource: Option<&str>,
		client_id: &str,
		multi_resource: bool,
		user_id: Option<&str>,
	) -> Result<Self> {
		let authority = normalize_authority(authority)?;

		if is_blank(client_id) {
			return Err(Error::invalid_argument("client_id", "Must not be blank."));
		}

		let resource = if multi_resource {
			""
		} else {
			match resource {
				Some(resource) if !is_blank(resource) => resource,
				_ => return Err(Error::invalid_argument("resource", "Must not be blank.")),
			}
		};

		Ok(Self(join(&authority, resource, &client_id.to_lowercase(), multi_resource, user_id)))
	}

	/// Key of the per-resource entry for a request made on behalf of `user_id`.
	pub fn for_request(request: &TokenRequest, user_id: Option<&str>) -> Result<Self> {
		Self::new(&request.authority, Some(&request.resource), &request.client_id, false, user_id)
	}

	/// Alternate key under which the multi-resource refresh token of a request is filed.
	pub fn for_multi_resource_refresh_token(
		authority: &str,
		client_id: &str,
		user_id: Option<&str>,
	) -> Result<Self> {
		Self::new(authority, None, client_id, true, user_id)
	}

	/// Key under which a family refresh token shared by a group of client ids is filed.
	pub fn for_family_refresh_token(
		authority: &str,
		family_client_id: &str,
		user_id: Option<&str>,
	) -> Result<Self> {
		let authority = normalize_authority(authority)?;

		if is_blank(family_client_id) {
			return Err(Error::invalid_argument("family_client_id", "Must not be blank."));
		}

		let mut key = join(&authority, "", "", true, user_id);

		key.push_str(DELIMITER);
		key.push_str(FAMILY_PREFIX);
		key.push_str(&family_client_id.to_lowercase());

		Ok(Self(key))
	}

	/// Re-derive the key of a stored item from its own fields.
	pub fn for_item(item: &TokenCacheItem) -> Result<Self> {
		let user_id = item.user_id();

		match item.entry_kind() {
			TokenEntryKind::Regular => Self::new(
				&item.authority,
				item.resource.as_deref(),
				item.client_id.as_deref().unwrap_or_default(),
				false,
				user_id,
			),
			TokenEntryKind::MultiResourceRefreshToken => Self::for_multi_resource_refresh_token(
				&item.authority,
				item.client_id.as_deref().unwrap_or_default(),
				user_id,
			),
			TokenEntryKind::FamilyRefreshToken => Self::for_family_refresh_token(
				&item.authority,
				item.family_client_id.as_deref().unwrap_or_default(),
				user_id,
			),
		}
	}

	/// Borrow the key as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Whether the key files a multi-resource or family refresh token.
	pub fn is_multi_resource(&self) -> bool {
		self.0.split(DELIMITER).nth(3) == Some("y")
	}
}
impl Display for CacheKey {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.write_str(&self.0)
	}
}
impl AsRef<str> for CacheKey {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

fn normalize_authority(authority: &str) -> Result<String> {
	if is_blank(authority) {
		return Err(Error::invalid_argument("authority", "Must not be blank."));
	}

	let lowered = authority.to_lowercase();

	Ok(match lowered.strip_suffix('/') {
		Some(stripped) => stripped.to_owned(),
		None => lowered,
	})
}

fn join(
	authority: &str,
	resource: &str,
	client_id: &str,
	multi_resource: bool,
	user_id: Option<&str>,
) -> String {
	let user_id = user_id.filter(|id| !is_blank(id)).map(str::to_lowercase).unwrap_or_default();
	let flag = if multi_resource { "y" } else { "n" };

	[authority, resource, client_id, flag, &user_id].join(DELIMITER)
}

fn is_blank(value: &str) -> bool {
	value.trim().is_empty()
}
