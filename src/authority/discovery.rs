//! Instance discovery and single-flight authority validation.

// crates.io
use http::StatusCode;
use tokio::sync::Mutex;
use url::Url;
use uuid::Uuid;
// self
use crate::{
	_prelude::*,
	authority::alias::{
		AuthorityAliasCache, INSTANCE_DISCOVERY_DOCUMENT, InstanceDiscoveryMetadata,
		InstanceDiscoveryResponse,
	},
	config::Settings,
	http::{
		client::{HttpResponse, HttpTransport},
		requestor::{self, MetadataClient, MetadataRequestor},
	},
	security,
};

/// Instance discovery endpoint path, relative to the trusted host.
pub const INSTANCE_DISCOVERY_PATH: &str = "/common/discovery/instance";
/// Instance discovery API version.
pub const INSTANCE_DISCOVERY_API_VERSION: &str = "1.1";
/// Authorization endpoint path sent as the discovery subject; the tenant is always `common`.
pub const AUTHORIZATION_COMMON_PATH: &str = "/common/oauth2/authorize";

/// Instance discovery query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstanceDiscoveryRequest {
	/// Host answering the query.
	pub trusted_host: String,
	/// Host of the authority being validated.
	pub authority_host: String,
}
impl InstanceDiscoveryRequest {
	/// Full discovery URL for this query.
	pub fn url(&self) -> Result<Url> {
		let mut url =
			Url::parse(&format!("https://{}{INSTANCE_DISCOVERY_PATH}", self.trusted_host))?;

		url.query_pairs_mut()
			.append_pair("api-version", INSTANCE_DISCOVERY_API_VERSION)
			.append_pair(
				"authorization_endpoint",
				&format!("https://{}{AUTHORIZATION_COMMON_PATH}", self.authority_host),
			);

		Ok(url)
	}
}

/// Fetches instance discovery documents.
#[derive(Clone, Debug)]
pub struct InstanceDiscoveryRequestor<T> {
	client: MetadataClient<T>,
}
impl<T> InstanceDiscoveryRequestor<T>
where
	T: HttpTransport,
{
	/// Build a requestor issuing requests through `client`.
	pub fn new(client: MetadataClient<T>) -> Self {
		Self { client }
	}
}
impl<T> MetadataRequestor for InstanceDiscoveryRequestor<T>
where
	T: HttpTransport,
{
	type Metadata = InstanceDiscoveryResponse;
	type Options = InstanceDiscoveryRequest;

	fn correlation_id(&self) -> Option<Uuid> {
		self.client.correlation_id()
	}

	#[tracing::instrument(
		skip(self, request),
		fields(
			correlation_id = ?self.client.correlation_id(),
			trusted_host = %request.trusted_host,
			authority_host = %request.authority_host,
		)
	)]
	async fn request_metadata(
		&self,
		request: InstanceDiscoveryRequest,
	) -> Result<InstanceDiscoveryResponse> {
		let url = request.url()?;
		let response = self.client.get(&url).await?;

		// Rejected authorities come back as 400 with a JSON error body.
		if response.status != StatusCode::BAD_REQUEST {
			requestor::ensure_ok(&response)?;
		}

		let metadata = match self.parse_metadata(&response) {
			Ok(metadata) => metadata,
			Err(_) if response.status == StatusCode::BAD_REQUEST => {
				return Err(requestor::status_error(&response));
			},
			Err(err) => return Err(err),
		};

		if let Some(codes) = metadata.error_codes.as_ref().filter(|codes| !codes.is_empty()) {
			tracing::warn!(
				?codes,
				error = ?metadata.error,
				"instance discovery rejected authority"
			);

			return Err(Error::InvalidAuthority {
				authority: request.authority_host,
				reason: format!(
					"Instance discovery failed with error codes {codes:?}: {}",
					metadata.error_description.as_deref().unwrap_or_default()
				),
			});
		}
		if response.status != StatusCode::OK {
			return Err(requestor::status_error(&response));
		}

		Ok(metadata)
	}

	fn parse_metadata(&self, response: &HttpResponse) -> Result<InstanceDiscoveryResponse> {
		requestor::parse_json(INSTANCE_DISCOVERY_DOCUMENT, &response.body)
	}
}

/// Validates authorities against instance discovery and fills the alias cache.
#[derive(Debug)]
pub struct AuthorityValidator<T> {
	requestor: InstanceDiscoveryRequestor<T>,
	cache: AuthorityAliasCache,
	settings: Settings,
	single_flight: Mutex<()>,
}
impl<T> AuthorityValidator<T>
where
	T: HttpTransport,
{
	/// Build a validator that files results into `cache`.
	pub fn new(client: MetadataClient<T>, cache: AuthorityAliasCache, settings: &Settings) -> Self {
		Self {
			requestor: InstanceDiscoveryRequestor::new(client),
			cache,
			settings: settings.clone(),
			single_flight: Mutex::new(()),
		}
	}

	/// Alias cache shared with this validator.
	pub fn cache(&self) -> &AuthorityAliasCache {
		&self.cache
	}

	/// Validate `authority`, querying instance discovery when its host is unknown.
	///
	/// At most one discovery request is in flight per validator; concurrent callers wait and then
	/// observe the cached outcome.
	#[tracing::instrument(skip(self), fields(authority = %authority))]
	pub async fn validate(&self, authority: &Url) -> Result<Arc<InstanceDiscoveryMetadata>> {
		let host = verify_authority_shape(authority)?;

		if let Some(metadata) = self.cache.get(&host) {
			return validated(authority, metadata);
		}

		let _guard = self.single_flight.lock().await;

		// Another caller may have finished discovery while this one waited.
		if let Some(metadata) = self.cache.get(&host) {
			return validated(authority, metadata);
		}

		let trusted_host = if self.settings.is_trusted_authority_host(&host) {
			host.clone()
		} else {
			security::canonicalize_dns_name(&self.settings.instance_discovery_host)
				.unwrap_or_else(|| self.settings.instance_discovery_host.clone())
		};
		let response = self
			.requestor
			.request_metadata(InstanceDiscoveryRequest {
				trusted_host,
				authority_host: host.clone(),
			})
			.await?;

		self.cache.ingest_discovery_response(&host, &response)?;

		if !self.cache.contains_host(&host) {
			self.cache.update_host(&host, InstanceDiscoveryMetadata::single_alias(&host))?;
		}

		let metadata = self.cache.get(&host).ok_or_else(|| Error::InvalidAuthority {
			authority: authority.to_string(),
			reason: "Instance discovery produced no entry for the host.".into(),
		})?;

		tracing::debug!(validated = metadata.is_validated(), "authority discovery complete");

		validated(authority, metadata)
	}
}

/// Check that `authority` has the `https://<host>/<tenant>` shape; returns its canonical host.
pub fn verify_authority_shape(authority: &Url) -> Result<String> {
	let invalid = |reason: &str| Error::InvalidAuthority {
		authority: authority.to_string(),
		reason: reason.into(),
	};

	if authority.scheme() != "https" {
		return Err(invalid("Authority must use HTTPS."));
	}
	if authority.query().is_some() || authority.fragment().is_some() {
		return Err(invalid("Authority must not carry a query or fragment."));
	}
	if authority.path().trim_matches('/').is_empty() {
		return Err(invalid("Authority must include a tenant path."));
	}

	security::url_host(authority).ok_or_else(|| invalid("Authority must include a host."))
}

fn validated(
	authority: &Url,
	metadata: Arc<InstanceDiscoveryMetadata>,
) -> Result<Arc<InstanceDiscoveryMetadata>> {
	if metadata.is_validated() {
		Ok(metadata)
	} else {
		Err(Error::InvalidAuthority {
			authority: authority.to_string(),
			reason: "Instance discovery does not recognise the authority host.".into(),
		})
	}
}
