//! Correlation-tagged metadata fetch pattern shared by the discovery and federation requestors.

// crates.io
use http::{
	HeaderMap, HeaderValue, StatusCode,
	header::{ACCEPT, HeaderName},
};
use serde::de::DeserializeOwned;
use url::Url;
use uuid::Uuid;
// self
use crate::{
	_prelude::*,
	config::Settings,
	http::client::{HttpResponse, HttpTransport},
	security,
};

/// Header carrying the caller's correlation id.
pub const CLIENT_REQUEST_ID: &str = "client-request-id";
/// Header asking the service to echo the correlation id back.
pub const RETURN_CLIENT_REQUEST_ID: &str = "return-client-request-id";

/// Fetches and parses one kind of metadata document.
pub trait MetadataRequestor {
	/// Parsed document type.
	type Metadata;
	/// Per-request input.
	type Options;

	/// Correlation id attached to every outbound request of this requestor.
	fn correlation_id(&self) -> Option<Uuid>;

	/// Fetch and parse the metadata selected by `options`.
	fn request_metadata(
		&self,
		options: Self::Options,
	) -> impl Future<Output = Result<Self::Metadata>> + Send;

	/// Parse a raw response into the metadata type.
	fn parse_metadata(&self, response: &HttpResponse) -> Result<Self::Metadata>;
}

/// Transport plus the request policy every requestor applies.
#[derive(Clone, Debug)]
pub struct MetadataClient<T> {
	transport: T,
	correlation_id: Option<Uuid>,
	request_timeout: Duration,
	require_https: bool,
}
impl<T> MetadataClient<T>
where
	T: HttpTransport,
{
	/// Wrap `transport` with the timeout and HTTPS policy of `settings`.
	pub fn new(transport: T, settings: &Settings) -> Self {
		Self {
			transport,
			correlation_id: None,
			request_timeout: settings.request_timeout,
			require_https: settings.require_https,
		}
	}

	/// Tag every request issued through this client with `correlation_id`.
	pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
		self.correlation_id = Some(correlation_id);

		self
	}

	/// Underlying transport.
	pub fn transport(&self) -> &T {
		&self.transport
	}

	/// Correlation id forwarded in request headers, if any.
	pub fn correlation_id(&self) -> Option<Uuid> {
		self.correlation_id
	}

	/// Whether endpoints must use HTTPS.
	pub fn require_https(&self) -> bool {
		self.require_https
	}

	/// Issue a correlated GET request.
	pub async fn get(&self, url: &Url) -> Result<HttpResponse> {
		if self.require_https {
			security::enforce_https(url)?;
		}

		self.transport.get(url, request_headers(self.correlation_id), self.request_timeout).await
	}
}

/// Headers sent with every metadata request.
pub fn request_headers(correlation_id: Option<Uuid>) -> HeaderMap {
	let mut headers = HeaderMap::new();

	headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

	if let Some(correlation_id) = correlation_id
		&& let Ok(value) = HeaderValue::from_str(&correlation_id.to_string())
	{
		headers.insert(HeaderName::from_static(CLIENT_REQUEST_ID), value);
		headers.insert(
			HeaderName::from_static(RETURN_CLIENT_REQUEST_ID),
			HeaderValue::from_static("true"),
		);
	}

	headers
}

/// Reject anything but `200 OK`.
pub fn ensure_ok(response: &HttpResponse) -> Result<()> {
	if response.status == StatusCode::OK {
		Ok(())
	} else {
		Err(status_error(response))
	}
}

/// Fetch error describing the status and body of `response`.
pub fn status_error(response: &HttpResponse) -> Error {
	Error::HttpStatus {
		status: response.status,
		url: response.url.clone(),
		body: Some(response.body.clone()).filter(|body| !body.is_empty()),
	}
}

/// Decode a JSON document, labelling failures with `document`.
pub fn parse_json<M>(document: &'static str, body: &str) -> Result<M>
where
	M: DeserializeOwned,
{
	serde_json::from_str(body).map_err(|err| Error::parse(document, err))
}
