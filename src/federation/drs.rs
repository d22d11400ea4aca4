//! Device registration service (DRS) discovery with on-prem first, cloud fallback resolution.

// std
use std::fmt::{Display, Formatter, Result as FmtResult};
// crates.io
use serde::Deserialize;
use url::Url;
use uuid::Uuid;
// self
use crate::{
	_prelude::*,
	config::Settings,
	http::{
		client::{HttpResponse, HttpTransport},
		requestor::{self, MetadataClient, MetadataRequestor},
	},
	security,
};

/// Document label used in parse errors.
pub const DRS_DOCUMENT: &str = "DRS metadata";
/// Host prefix of the on-prem DRS endpoint.
pub const DRS_HOST_PREFIX: &str = "enterpriseregistration.";
/// Path of the DRS contract document.
pub const DRS_CONTRACT_PATH: &str = "enrollmentserver/contract";
/// DRS API version.
pub const DRS_API_VERSION: &str = "1.0";

/// DRS discovery document.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DrsMetadata {
	/// Federation endpoint of the organisation.
	pub identity_provider_service: IdentityProviderService,
}
impl DrsMetadata {
	/// Passive authentication endpoint advertised by the organisation.
	pub fn passive_auth_endpoint(&self) -> &Url {
		&self.identity_provider_service.passive_auth_endpoint
	}
}

/// Identity provider section of a DRS document.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IdentityProviderService {
	/// Passive authentication (federation) endpoint.
	pub passive_auth_endpoint: Url,
}

/// Where a DRS document is resolved from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
	/// `enterpriseregistration.<domain>`, operated by the organisation.
	OnPrem,
	/// The public cloud resolver, addressed by domain.
	Cloud,
}
impl Resolution {
	/// Resolution attempted when this one cannot resolve its host.
	pub fn fallback(self) -> Option<Self> {
		match self {
			Self::OnPrem => Some(Self::Cloud),
			Self::Cloud => None,
		}
	}

	/// DRS contract URL for `domain` under this resolution.
	pub fn url(self, domain: &str, cloud_resolver: &Url) -> Result<Url> {
		let mut url = match self {
			Self::OnPrem => {
				Url::parse(&format!("https://{DRS_HOST_PREFIX}{domain}/{DRS_CONTRACT_PATH}"))?
			},
			Self::Cloud => cloud_resolver.join(&format!("{domain}/{DRS_CONTRACT_PATH}"))?,
		};

		url.query_pairs_mut().append_pair("api-version", DRS_API_VERSION);

		Ok(url)
	}
}
impl Display for Resolution {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.write_str(match self {
			Self::OnPrem => "on-prem",
			Self::Cloud => "cloud",
		})
	}
}

/// Result of one DRS leg.
#[derive(Debug)]
pub enum DrsOutcome {
	/// The document was fetched and parsed.
	Resolved(DrsMetadata),
	/// The DRS host did not resolve; the next resolution may be tried.
	HostUnresolved,
	/// Any other failure; terminal.
	Failed(Error),
}
impl From<Result<DrsMetadata>> for DrsOutcome {
	fn from(result: Result<DrsMetadata>) -> Self {
		match result {
			Ok(metadata) => Self::Resolved(metadata),
			Err(Error::HostUnresolved { .. }) => Self::HostUnresolved,
			Err(err) => Self::Failed(err),
		}
	}
}

/// Fetches DRS discovery documents.
#[derive(Clone, Debug)]
pub struct DrsRequestor<T> {
	client: MetadataClient<T>,
	cloud_resolver: Url,
}
impl<T> DrsRequestor<T>
where
	T: HttpTransport,
{
	/// Build a requestor using the cloud resolver of `settings`.
	pub fn new(client: MetadataClient<T>, settings: &Settings) -> Self {
		Self { client, cloud_resolver: settings.drs_cloud_resolver.clone() }
	}

	/// Discover the DRS document of `domain`.
	///
	/// The on-prem endpoint is always tried first; the cloud resolver is only consulted when the
	/// on-prem host does not resolve. A cloud host that does not resolve is terminal.
	#[tracing::instrument(skip(self), fields(correlation_id = ?self.client.correlation_id()))]
	pub async fn request_drs_discovery(&self, domain: &str) -> Result<DrsMetadata> {
		let domain = canonical_domain(domain)?;
		let mut resolution = Resolution::OnPrem;

		loop {
			match self.request_leg(resolution, &domain).await {
				DrsOutcome::Resolved(metadata) => return Ok(metadata),
				DrsOutcome::Failed(err) => return Err(err),
				DrsOutcome::HostUnresolved => match resolution.fallback() {
					Some(next) => {
						tracing::debug!(%resolution, %next, "DRS host unresolved; falling back");

						resolution = next;
					},
					None => {
						return Err(Error::MetadataFetch {
							url: resolution.url(&domain, &self.cloud_resolver)?,
							reason: "DRS discovery failed: host could not be resolved.".into(),
						});
					},
				},
			}
		}
	}

	/// Run a single DRS leg without fallback.
	pub async fn request_leg(&self, resolution: Resolution, domain: &str) -> DrsOutcome {
		DrsOutcome::from(self.fetch(resolution, domain).await)
	}

	async fn fetch(&self, resolution: Resolution, domain: &str) -> Result<DrsMetadata> {
		let url = resolution.url(domain, &self.cloud_resolver)?;

		tracing::debug!(%resolution, %url, "requesting DRS discovery");

		let response = self.client.get(&url).await?;

		requestor::ensure_ok(&response)?;

		self.parse_metadata(&response)
	}
}
impl<T> MetadataRequestor for DrsRequestor<T>
where
	T: HttpTransport,
{
	type Metadata = DrsMetadata;
	type Options = String;

	fn correlation_id(&self) -> Option<Uuid> {
		self.client.correlation_id()
	}

	async fn request_metadata(&self, domain: String) -> Result<DrsMetadata> {
		self.request_drs_discovery(&domain).await
	}

	fn parse_metadata(&self, response: &HttpResponse) -> Result<DrsMetadata> {
		requestor::parse_json(DRS_DOCUMENT, &response.body)
	}
}

fn canonical_domain(domain: &str) -> Result<String> {
	let domain = security::canonicalize_dns_name(domain)
		.ok_or_else(|| Error::invalid_argument("domain", "Must not be blank."))?;

	if !domain.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-') {
		return Err(Error::invalid_argument("domain", "Must be a DNS name."));
	}

	Ok(domain)
}
