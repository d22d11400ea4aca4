//! WebFinger (RFC 7033) lookups against a federation endpoint.

// crates.io
use serde::Deserialize;
use url::Url;
use uuid::Uuid;
// self
use crate::{
	_prelude::*,
	federation::drs::{DRS_DOCUMENT, DrsMetadata},
	http::{
		client::{HttpResponse, HttpTransport},
		requestor::{self, MetadataClient, MetadataRequestor},
	},
};

/// Document label used in parse errors.
pub const WEBFINGER_DOCUMENT: &str = "WebFinger";
/// Well-known WebFinger path.
pub const WEBFINGER_PATH: &str = "/.well-known/webfinger";

/// WebFinger document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct WebFingerMetadata {
	/// Subject the document describes.
	#[serde(default)]
	pub subject: Option<String>,
	/// Link relations; `null` and absent both mean none.
	#[serde(default)]
	pub links: Option<Vec<Link>>,
}
impl WebFingerMetadata {
	/// Link relations of the document.
	pub fn links(&self) -> &[Link] {
		self.links.as_deref().unwrap_or_default()
	}
}

/// One WebFinger link relation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Link {
	/// Relation type.
	#[serde(default)]
	pub rel: Option<String>,
	/// Link target.
	#[serde(default)]
	pub href: Option<String>,
}

/// WebFinger query for `authority` against the federation endpoint found by DRS discovery.
#[derive(Clone, Debug)]
pub struct WebFingerRequest {
	/// Authority whose trust is being checked; sent as the WebFinger resource.
	pub authority: Url,
	/// DRS document naming the federation endpoint.
	pub drs_metadata: DrsMetadata,
}

/// Fetches WebFinger documents.
#[derive(Clone, Debug)]
pub struct WebFingerRequestor<T> {
	client: MetadataClient<T>,
}
impl<T> WebFingerRequestor<T>
where
	T: HttpTransport,
{
	/// Build a requestor issuing requests through `client`.
	pub fn new(client: MetadataClient<T>) -> Self {
		Self { client }
	}
}
impl<T> MetadataRequestor for WebFingerRequestor<T>
where
	T: HttpTransport,
{
	type Metadata = WebFingerMetadata;
	type Options = WebFingerRequest;

	fn correlation_id(&self) -> Option<Uuid> {
		self.client.correlation_id()
	}

	#[tracing::instrument(
		skip(self, request),
		fields(
			correlation_id = ?self.client.correlation_id(),
			authority = %request.authority,
		)
	)]
	async fn request_metadata(&self, request: WebFingerRequest) -> Result<WebFingerMetadata> {
		let url = build_webfinger_url(
			&request.authority,
			&request.drs_metadata,
			self.client.require_https(),
		)?;

		tracing::debug!(%url, "requesting WebFinger metadata");

		let response = self.client.get(&url).await?;

		requestor::ensure_ok(&response)?;

		self.parse_metadata(&response)
	}

	fn parse_metadata(&self, response: &HttpResponse) -> Result<WebFingerMetadata> {
		requestor::parse_json(WEBFINGER_DOCUMENT, &response.body)
	}
}

/// WebFinger URL on the host of the passive auth endpoint, with `authority` sent unchanged as the
/// resource.
///
/// With `require_https` the URL is always `https://<host>`; otherwise the endpoint's scheme and
/// port are kept.
pub fn build_webfinger_url(
	authority: &Url,
	drs_metadata: &DrsMetadata,
	require_https: bool,
) -> Result<Url> {
	let endpoint = drs_metadata.passive_auth_endpoint();
	let host = endpoint
		.host_str()
		.ok_or_else(|| Error::parse(DRS_DOCUMENT, "passive auth endpoint has no host"))?;
	let origin = match (require_https, endpoint.port()) {
		(false, Some(port)) => format!("{}://{host}:{port}", endpoint.scheme()),
		(false, None) => format!("{}://{host}", endpoint.scheme()),
		(true, _) => format!("https://{host}"),
	};
	let mut url = Url::parse(&origin)?.join(WEBFINGER_PATH)?;

	url.query_pairs_mut().append_pair("resource", authority.as_str());

	Ok(url)
}
