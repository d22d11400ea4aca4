//! Process-wide authority alias cache fed by instance discovery responses.
//!
//! Every alias of a validated cluster maps to one shared [`InstanceDiscoveryMetadata`], so
//! validating any alias validates the whole cluster. Hosts confirmed as unsupported are kept as
//! negative entries, which is a terminal outcome rather than an error.

// std
use std::{
	collections::HashMap,
	sync::{Mutex, MutexGuard, PoisonError},
};
// crates.io
use serde::{Deserialize, Serialize};
use url::Url;
// self
use crate::{_prelude::*, http::requestor, security};

/// Document label used in parse errors.
pub const INSTANCE_DISCOVERY_DOCUMENT: &str = "instance discovery";

/// Alias metadata of one authority cluster.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InstanceDiscoveryMetadata {
	preferred_network: Option<String>,
	preferred_cache: Option<String>,
	aliases: Vec<String>,
	is_validated: bool,
}
impl InstanceDiscoveryMetadata {
	/// Negative entry for a host that instance discovery does not recognise.
	pub fn not_validated() -> Self {
		Self {
			preferred_network: None,
			preferred_cache: None,
			aliases: Vec::new(),
			is_validated: false,
		}
	}

	/// Validated cluster entry; hosts are canonicalised and de-duplicated.
	pub fn validated(
		preferred_network: &str,
		preferred_cache: &str,
		aliases: impl IntoIterator<Item = String>,
	) -> Self {
		Self {
			preferred_network: security::canonicalize_dns_name(preferred_network),
			preferred_cache: security::canonicalize_dns_name(preferred_cache),
			aliases: security::normalize_hosts(aliases.into_iter().collect()),
			is_validated: true,
		}
	}

	/// Validated entry for a host that is its own network, cache, and only alias.
	pub fn single_alias(host: &str) -> Self {
		Self::validated(host, host, [host.to_owned()])
	}

	/// Host preferred for network requests.
	pub fn preferred_network(&self) -> Option<&str> {
		self.preferred_network.as_deref()
	}

	/// Host preferred as the cache authority.
	pub fn preferred_cache(&self) -> Option<&str> {
		self.preferred_cache.as_deref()
	}

	/// Every host of the cluster.
	pub fn aliases(&self) -> &[String] {
		&self.aliases
	}

	/// Whether instance discovery validated the cluster.
	pub fn is_validated(&self) -> bool {
		self.is_validated
	}
}

/// Instance discovery response body.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct InstanceDiscoveryResponse {
	/// Presence marks the queried authority as valid.
	#[serde(default)]
	pub tenant_discovery_endpoint: Option<String>,
	/// Alias clusters known to the service.
	#[serde(default)]
	pub metadata: Option<Vec<ClusterDescriptor>>,
	/// OAuth2 error code.
	#[serde(default)]
	pub error: Option<String>,
	/// OAuth2 error description.
	#[serde(default)]
	pub error_description: Option<String>,
	/// Service error codes; present when the request was rejected.
	#[serde(default)]
	pub error_codes: Option<Vec<i64>>,
}
impl InstanceDiscoveryResponse {
	/// Whether the response carries the tenant discovery marker.
	pub fn has_tenant_discovery_endpoint(&self) -> bool {
		self.tenant_discovery_endpoint
			.as_deref()
			.map(|value| !value.trim().is_empty())
			.unwrap_or(false)
	}
}

/// One alias cluster from the `metadata` array.
#[derive(Clone, Debug, Deserialize)]
pub struct ClusterDescriptor {
	/// Host preferred for network requests.
	pub preferred_network: String,
	/// Host preferred as the cache authority.
	pub preferred_cache: String,
	/// Every host of the cluster.
	pub aliases: Vec<String>,
}

/// Shared, explicitly clearable map from authority host to cluster metadata.
///
/// Clones share state; construct one per process (or per test) and hand it to every consumer.
#[derive(Clone, Debug, Default)]
pub struct AuthorityAliasCache {
	entries: Arc<Mutex<HashMap<String, Arc<InstanceDiscoveryMetadata>>>>,
}
impl AuthorityAliasCache {
	/// Create an empty cache.
	pub fn new() -> Self {
		Self::default()
	}

	/// Whether `host` has an entry, validated or not.
	pub fn contains_host(&self, host: &str) -> bool {
		key(host).map(|host| self.lock().contains_key(&host)).unwrap_or(false)
	}

	/// Whether `host` belongs to a validated cluster.
	pub fn is_validated(&self, host: &str) -> bool {
		self.get(host).map(|metadata| metadata.is_validated()).unwrap_or(false)
	}

	/// Metadata filed under `host`.
	pub fn get(&self, host: &str) -> Option<Arc<InstanceDiscoveryMetadata>> {
		key(host).and_then(|host| self.lock().get(&host).cloned())
	}

	/// Aliases of the cluster `host` belongs to; empty when unknown or not validated.
	pub fn aliases(&self, host: &str) -> Vec<String> {
		self.get(host).map(|metadata| metadata.aliases().to_vec()).unwrap_or_default()
	}

	/// Number of hosts with an entry.
	pub fn len(&self) -> usize {
		self.lock().len()
	}

	/// Whether no host has an entry.
	pub fn is_empty(&self) -> bool {
		self.lock().is_empty()
	}

	/// File a discovery response received for `authority_host`.
	///
	/// The whole response is checked before the cache is touched, so a rejected response leaves
	/// every host untouched.
	pub fn ingest_discovery_response(
		&self,
		authority_host: &str,
		response: &InstanceDiscoveryResponse,
	) -> Result<()> {
		let authority_host = key(authority_host)
			.ok_or_else(|| Error::invalid_argument("authority_host", "Must not be blank."))?;
		let updates = plan_updates(&authority_host, response)?;
		let mut entries = self.lock();

		for (host, metadata) in updates {
			entries.insert(host, metadata);
		}

		tracing::debug!(
			host = %authority_host,
			validated = entries.get(&authority_host).map(|m| m.is_validated()),
			"instance discovery response ingested"
		);

		Ok(())
	}

	/// Parse a raw discovery body and ingest it.
	pub fn ingest_raw(&self, authority_host: &str, body: &str) -> Result<()> {
		let response = requestor::parse_json(INSTANCE_DISCOVERY_DOCUMENT, body)?;

		self.ingest_discovery_response(authority_host, &response)
	}

	/// Overwrite the entry of `host` without a discovery round trip.
	pub fn update_host(&self, host: &str, metadata: InstanceDiscoveryMetadata) -> Result<()> {
		let host = key(host).ok_or_else(|| Error::invalid_argument("host", "Must not be blank."))?;

		self.lock().insert(host, Arc::new(metadata));

		Ok(())
	}

	/// Drop every entry.
	pub fn clear(&self) {
		self.lock().clear();
	}

	/// Rewrite `authority` to the preferred cache host of its cluster.
	///
	/// Authorities outside a validated cluster are returned unchanged.
	pub fn preferred_cache_authority(&self, authority: &Url) -> Result<Url> {
		let Some(host) = security::url_host(authority) else {
			return Ok(authority.clone());
		};
		let Some(preferred) = self
			.get(&host)
			.filter(|metadata| metadata.is_validated())
			.and_then(|metadata| metadata.preferred_cache().map(str::to_owned))
		else {
			return Ok(authority.clone());
		};
		let mut rewritten = authority.clone();

		if preferred != host {
			rewritten.set_host(Some(&preferred))?;
		}

		Ok(rewritten)
	}

	// Entries are replaced whole under the lock, so a poisoned map is still consistent.
	fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<InstanceDiscoveryMetadata>>> {
		self.entries.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

fn key(host: &str) -> Option<String> {
	security::canonicalize_dns_name(host)
}

fn plan_updates(
	authority_host: &str,
	response: &InstanceDiscoveryResponse,
) -> Result<Vec<(String, Arc<InstanceDiscoveryMetadata>)>> {
	if !response.has_tenant_discovery_endpoint() {
		let negative = Arc::new(InstanceDiscoveryMetadata::not_validated());

		return Ok(vec![(authority_host.to_owned(), negative)]);
	}

	let clusters = match response.metadata.as_deref() {
		Some(clusters) if !clusters.is_empty() => clusters,
		_ => {
			tracing::debug!(host = %authority_host, "no metadata returned from instance discovery");

			return Ok(vec![(
				authority_host.to_owned(),
				Arc::new(InstanceDiscoveryMetadata::single_alias(authority_host)),
			)]);
		},
	};
	let mut updates = Vec::new();

	for cluster in clusters {
		let metadata = InstanceDiscoveryMetadata::validated(
			&cluster.preferred_network,
			&cluster.preferred_cache,
			cluster.aliases.iter().cloned(),
		);

		if metadata.aliases.is_empty()
			|| metadata.preferred_network.is_none()
			|| metadata.preferred_cache.is_none()
		{
			return Err(Error::parse(
				INSTANCE_DISCOVERY_DOCUMENT,
				"cluster descriptor without aliases or preferred hosts",
			));
		}

		let metadata = Arc::new(metadata);

		updates.extend(metadata.aliases.iter().map(|alias| (alias.clone(), metadata.clone())));
	}

	Ok(updates)
}
