//! Integration tests against mock metadata endpoints and on-disk token caches.

mod discovery;
mod federation;
mod persistence;

// std
use std::time::Duration;
// crates.io
use http::HeaderMap;
use identity_cache::{HttpResponse, HttpTransport, ReqwestTransport, Result, Settings};
use url::Url;

/// Settings pointed at plaintext mock servers.
pub fn mock_settings() -> Settings {
	Settings::default().with_require_https(false).with_request_timeout(Duration::from_secs(10))
}

/// Transport that sends every request to a mock server, keeping path, query, and headers.
#[derive(Clone, Debug)]
pub struct Rebase {
	inner: ReqwestTransport,
	target: Url,
}
impl Rebase {
	pub fn new(target: &str) -> Self {
		let inner = ReqwestTransport::new(&mock_settings()).expect("transport");

		Self { inner, target: Url::parse(target).expect("mock server uri") }
	}
}
impl HttpTransport for Rebase {
	async fn get(&self, url: &Url, headers: HeaderMap, timeout: Duration) -> Result<HttpResponse> {
		let mut rebased = self.target.clone();

		rebased.set_path(url.path());
		rebased.set_query(url.query());

		self.inner.get(&rebased, headers, timeout).await
	}
}
