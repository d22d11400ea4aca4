//! Token cache entries and the token responses they are created from.

// crates.io
use serde::{Deserialize, Serialize};
// self
use crate::{_prelude::*, config::Settings};

/// Identity of the user a token was issued to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
	/// Unique, immutable user id (object id or subject).
	#[serde(default)]
	pub user_id: Option<String>,
	/// Displayable id such as a UPN or email.
	#[serde(default)]
	pub displayable_id: Option<String>,
	/// Given name.
	#[serde(default)]
	pub given_name: Option<String>,
	/// Family name.
	#[serde(default)]
	pub family_name: Option<String>,
	/// Identity provider that authenticated the user.
	#[serde(default)]
	pub identity_provider: Option<String>,
}
impl UserInfo {
	/// User info carrying only the unique id.
	pub fn with_user_id(user_id: impl Into<String>) -> Self {
		Self { user_id: Some(user_id.into()), ..Self::default() }
	}
}

/// Token response received from the token endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenResponse {
	/// Access token.
	pub access_token: Option<String>,
	/// Refresh token.
	pub refresh_token: Option<String>,
	/// Raw id token.
	pub id_token: Option<String>,
	/// Access token expiry.
	pub expires_on: Option<DateTime<Utc>>,
	/// Whether the refresh token may be redeemed for other resources.
	pub is_multi_resource_refresh_token: bool,
	/// Tenant that issued the token.
	pub tenant_id: Option<String>,
	/// Family the client belongs to, when the refresh token is shared by a family.
	pub family_client_id: Option<String>,
	/// User the token was issued to.
	pub user_info: Option<UserInfo>,
}

/// Shape of a cache entry, which decides the key it is filed under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenEntryKind {
	/// Access and refresh token scoped to one resource.
	Regular,
	/// Refresh token usable across resources of one client.
	MultiResourceRefreshToken,
	/// Refresh token shared by a family of client ids.
	FamilyRefreshToken,
}

/// Cached token entry.
///
/// Entries are replaced wholesale by the owning store; callers never patch fields of a stored
/// entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCacheItem {
	/// Authority the token was issued by.
	pub authority: String,
	/// Resource of the access token; absent for multi-resource and family entries.
	#[serde(default)]
	pub resource: Option<String>,
	/// Client id; absent for family entries.
	#[serde(default)]
	pub client_id: Option<String>,
	/// Access token; absent for multi-resource and family entries.
	#[serde(default)]
	pub access_token: Option<String>,
	/// Refresh token.
	#[serde(default)]
	pub refresh_token: Option<String>,
	/// Raw id token.
	#[serde(default)]
	pub raw_id_token: Option<String>,
	/// Expiry instant, always UTC.
	#[serde(default)]
	pub expires_on: Option<DateTime<Utc>>,
	/// Whether the refresh token may be redeemed for other resources.
	#[serde(default)]
	pub is_multi_resource_refresh_token: bool,
	/// Tenant that issued the token.
	#[serde(default)]
	pub tenant_id: Option<String>,
	/// Family the refresh token is shared with.
	#[serde(default)]
	pub family_client_id: Option<String>,
	/// User the token was issued to.
	#[serde(default)]
	pub user_info: Option<UserInfo>,
}
impl TokenCacheItem {
	fn from_response(authority: &str, response: &TokenResponse) -> Result<Self> {
		if authority.trim().is_empty() {
			return Err(Error::invalid_argument("authority", "Must not be blank."));
		}

		Ok(Self {
			authority: authority.to_owned(),
			resource: None,
			client_id: None,
			access_token: None,
			refresh_token: response.refresh_token.clone(),
			raw_id_token: response.id_token.clone(),
			expires_on: response.expires_on,
			is_multi_resource_refresh_token: response.is_multi_resource_refresh_token,
			tenant_id: response.tenant_id.clone(),
			family_client_id: response.family_client_id.clone(),
			user_info: response.user_info.clone(),
		})
	}

	/// Entry holding the access token for one resource.
	pub fn regular(
		authority: &str,
		resource: &str,
		client_id: &str,
		response: &TokenResponse,
	) -> Result<Self> {
		let mut item = Self::from_response(authority, response)?;

		item.resource = Some(resource.to_owned());
		item.client_id = Some(client_id.to_owned());
		item.access_token = response.access_token.clone();

		Ok(item)
	}

	/// Entry holding a multi-resource refresh token for a client.
	pub fn multi_resource(
		authority: &str,
		client_id: &str,
		response: &TokenResponse,
	) -> Result<Self> {
		let mut item = Self::from_response(authority, response)?;

		item.client_id = Some(client_id.to_owned());

		Ok(item)
	}

	/// Entry holding a refresh token shared by a client family.
	pub fn family(authority: &str, response: &TokenResponse) -> Result<Self> {
		Self::from_response(authority, response)
	}

	/// Shape of this entry.
	pub fn entry_kind(&self) -> TokenEntryKind {
		if !is_blank(self.resource.as_deref()) {
			TokenEntryKind::Regular
		} else if is_blank(self.client_id.as_deref()) {
			TokenEntryKind::FamilyRefreshToken
		} else {
			TokenEntryKind::MultiResourceRefreshToken
		}
	}

	/// Unique id of the user, if known.
	pub fn user_id(&self) -> Option<&str> {
		self.user_info.as_ref().and_then(|info| info.user_id.as_deref())
	}

	/// Whether the refresh token is shared with a client family.
	pub fn is_family_token(&self) -> bool {
		!is_blank(self.family_client_id.as_deref())
	}

	/// Whether the entry expires within `buffer` of `now`.
	///
	/// Entries without an expiry never expire.
	pub fn is_expired_at(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
		let Some(expires_on) = self.expires_on else {
			return false;
		};
		let validity =
			TimeDelta::from_std(buffer).ok().and_then(|buffer| now.checked_add_signed(buffer));

		match validity {
			Some(validity) => expires_on < validity,
			None => true,
		}
	}

	/// Whether the entry expires within `buffer` of the current time.
	pub fn is_expired(&self, buffer: Duration) -> bool {
		self.is_expired_at(Utc::now(), buffer)
	}

	/// Whether the entry expires within the configured [`Settings::expiration_buffer`].
	pub fn is_expired_with(&self, settings: &Settings) -> bool {
		self.is_expired(settings.expiration_buffer)
	}
}

fn is_blank(value: Option<&str>) -> bool {
	value.map(|value| value.trim().is_empty()).unwrap_or(true)
}
