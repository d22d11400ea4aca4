//! HTTP transport capability used by the metadata requestors.

// std
use std::error::Error as StdError;
// crates.io
use http::{HeaderMap, StatusCode};
use reqwest::{Client, redirect::Policy};
use url::Url;
// self
use crate::{_prelude::*, config::Settings, security};

/// Maximum redirect depth followed by the default transport.
pub const MAX_REDIRECTS: usize = 10;
/// Connect timeout applied by the default transport.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Response captured from a metadata endpoint.
#[derive(Clone, Debug)]
pub struct HttpResponse {
	/// Final URL after redirects.
	pub url: Url,
	/// Response status.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Response body decoded as UTF-8 (lossy).
	pub body: String,
}
impl HttpResponse {
	/// Construct a header-less response.
	pub fn new(url: Url, status: StatusCode, body: impl Into<String>) -> Self {
		Self { url, status, headers: HeaderMap::new(), body: body.into() }
	}
}

/// Injected capability that performs a single GET request.
///
/// Implementations must not retry. A host that cannot be resolved is reported as
/// [`Error::HostUnresolved`] so callers can fall back to another endpoint.
pub trait HttpTransport: Send + Sync {
	/// Issue a GET request to `url` with the supplied headers, bounded by `timeout`.
	fn get(
		&self,
		url: &Url,
		headers: HeaderMap,
		timeout: Duration,
	) -> impl Future<Output = Result<HttpResponse>> + Send;
}
impl<T> HttpTransport for Arc<T>
where
	T: HttpTransport,
{
	fn get(
		&self,
		url: &Url,
		headers: HeaderMap,
		timeout: Duration,
	) -> impl Future<Output = Result<HttpResponse>> + Send {
		(**self).get(url, headers, timeout)
	}
}

/// Default transport backed by [`reqwest`].
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
	client: Client,
	max_response_bytes: u64,
}
impl ReqwestTransport {
	/// Build a transport with the default reqwest client.
	pub fn new(settings: &Settings) -> Result<Self> {
		settings.validate()?;

		let client = Client::builder()
			.redirect(Policy::limited(MAX_REDIRECTS))
			.user_agent(format!("identity-cache/{}", env!("CARGO_PKG_VERSION")))
			.connect_timeout(CONNECT_TIMEOUT)
			.build()?;

		Ok(Self::with_client(client, settings.max_response_bytes))
	}

	/// Build a transport using the supplied client (primarily for tests).
	pub fn with_client(client: Client, max_response_bytes: u64) -> Self {
		Self { client, max_response_bytes }
	}

	fn oversized(&self, url: &Url, size: u64) -> Error {
		Error::MetadataFetch {
			url: url.clone(),
			reason: format!(
				"Response size {size} bytes exceeds the configured guard of {limit} bytes.",
				limit = self.max_response_bytes
			),
		}
	}
}
impl HttpTransport for ReqwestTransport {
	async fn get(&self, url: &Url, headers: HeaderMap, timeout: Duration) -> Result<HttpResponse> {
		let start = Instant::now();
		let response = self
			.client
			.get(url.clone())
			.headers(headers)
			.timeout(timeout)
			.send()
			.await
			.map_err(|err| classify_send_error(url, err))?;
		let status = response.status();
		let headers = response.headers().clone();
		let final_url = response.url().clone();

		if let Some(length) = response.content_length()
			&& length > self.max_response_bytes
		{
			return Err(self.oversized(url, length));
		}

		let bytes = response.bytes().await?;

		if bytes.len() as u64 > self.max_response_bytes {
			return Err(self.oversized(url, bytes.len() as u64));
		}

		tracing::debug!(
			host = final_url.host_str().unwrap_or_default(),
			status = %status,
			elapsed = ?start.elapsed(),
			bytes = bytes.len(),
			"metadata fetch complete"
		);

		Ok(HttpResponse {
			url: final_url,
			status,
			headers,
			body: String::from_utf8_lossy(&bytes).into_owned(),
		})
	}
}

fn classify_send_error(url: &Url, err: reqwest::Error) -> Error {
	if err.is_connect()
		&& is_dns_failure(&err)
		&& let Some(host) = security::url_host(url)
	{
		tracing::debug!(%host, "host could not be resolved");

		return Error::HostUnresolved { host };
	}

	Error::Reqwest(err)
}

// hyper-util and the system resolver only surface DNS failures as message text.
fn is_dns_failure(err: &(dyn StdError + 'static)) -> bool {
	let mut current = Some(err);

	while let Some(err) = current {
		let message = err.to_string().to_ascii_lowercase();

		if message.contains("dns error")
			|| message.contains("failed to lookup address")
			|| message.contains("name or service not known")
			|| message.contains("no such host")
		{
			return true;
		}

		current = err.source();
	}

	false
}
