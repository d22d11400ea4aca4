//! Library settings and configuration validation.

// crates.io
use serde::{Deserialize, Serialize};
use url::Url;
// self
use crate::{_prelude::*, security};

/// Default window before `expires_on` in which a cached token already counts as expired.
pub const DEFAULT_EXPIRATION_BUFFER: Duration = Duration::from_secs(300);
/// Default timeout applied to each metadata request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Lower bound accepted for the request timeout.
pub const MIN_REQUEST_TIMEOUT: Duration = Duration::from_millis(100);
/// Default size guard (1 MiB).
pub const DEFAULT_MAX_RESPONSE_BYTES: u64 = 1_048_576;
/// Public cloud DRS resolver used when the on-prem DRS host does not resolve.
pub const DEFAULT_DRS_CLOUD_RESOLVER: &str = "https://enterpriseregistration.windows.net/";
/// Instance used to answer discovery queries for hosts outside the trusted list.
pub const DEFAULT_INSTANCE_DISCOVERY_HOST: &str = "login.microsoftonline.com";
/// Public cloud authority hosts that may answer their own instance discovery queries.
pub const DEFAULT_TRUSTED_AUTHORITY_HOSTS: [&str; 6] = [
	"login.windows.net",
	"login.microsoftonline.com",
	"login.chinacloudapi.cn",
	"login.microsoftonline.de",
	"login-us.microsoftonline.com",
	"login.microsoftonline.us",
];

/// Settings shared by the cache, discovery, and federation components.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
	/// Window before `expires_on` in which cached tokens are treated as expired.
	#[serde(default = "default_expiration_buffer")]
	pub expiration_buffer: Duration,
	/// Whether metadata endpoints and authorities must use HTTPS.
	#[serde(default = "default_true")]
	pub require_https: bool,
	/// Timeout applied to each metadata request.
	#[serde(default = "default_request_timeout")]
	pub request_timeout: Duration,
	/// Maximum accepted size of a metadata response body in bytes.
	#[serde(default = "default_max_response_bytes")]
	pub max_response_bytes: u64,
	/// Base URL of the cloud DRS resolver; the domain is appended as the first path segment.
	#[serde(default = "default_drs_cloud_resolver")]
	pub drs_cloud_resolver: Url,
	/// Host queried for instance discovery when the authority host is not trusted.
	#[serde(default = "default_instance_discovery_host")]
	pub instance_discovery_host: String,
	/// Hosts allowed to answer instance discovery for themselves.
	#[serde(
		default = "default_trusted_authority_hosts",
		deserialize_with = "security::deserialize_hosts"
	)]
	pub trusted_authority_hosts: Vec<String>,
}
impl Settings {
	/// Override the token expiration buffer.
	pub fn with_expiration_buffer(mut self, buffer: Duration) -> Self {
		self.expiration_buffer = buffer;

		self
	}

	/// Set HTTPS requirement to the desired value.
	pub fn with_require_https(mut self, require_https: bool) -> Self {
		self.require_https = require_https;

		self
	}

	/// Override the per-request timeout.
	pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Point the cloud DRS leg at a different resolver.
	pub fn with_drs_cloud_resolver(mut self, resolver: impl AsRef<str>) -> Result<Self> {
		self.drs_cloud_resolver = Url::parse(resolver.as_ref())?;

		Ok(self)
	}

	/// Override the host queried for instance discovery.
	pub fn with_instance_discovery_host(mut self, host: impl Into<String>) -> Self {
		self.instance_discovery_host = host.into();

		self
	}

	/// Replace the trusted authority host list.
	pub fn with_trusted_authority_hosts<I, S>(mut self, hosts: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.trusted_authority_hosts =
			security::normalize_hosts(hosts.into_iter().map(Into::into).collect());

		self
	}

	/// Whether the given host may answer instance discovery for itself.
	pub fn is_trusted_authority_host(&self, host: &str) -> bool {
		security::canonicalize_dns_name(host)
			.map(|host| self.trusted_authority_hosts.iter().any(|trusted| *trusted == host))
			.unwrap_or(false)
	}

	/// Validate the settings against the documented constraints.
	pub fn validate(&self) -> Result<()> {
		if self.request_timeout < MIN_REQUEST_TIMEOUT {
			return Err(Error::invalid_argument("request_timeout", "Must be at least 100 ms."));
		}
		if self.max_response_bytes == 0 {
			return Err(Error::invalid_argument("max_response_bytes", "Must be greater than zero."));
		}
		if self.require_https {
			security::enforce_https(&self.drs_cloud_resolver)?;
		}
		if self.drs_cloud_resolver.host_str().is_none() {
			return Err(Error::invalid_argument(
				"drs_cloud_resolver",
				"Must include a host component.",
			));
		}
		if !self.drs_cloud_resolver.path().ends_with('/') {
			return Err(Error::invalid_argument(
				"drs_cloud_resolver",
				"Path must end with '/' so the domain can be appended.",
			));
		}
		if security::canonicalize_dns_name(&self.instance_discovery_host).is_none() {
			return Err(Error::invalid_argument(
				"instance_discovery_host",
				"Must be a non-empty hostname.",
			));
		}

		for host in &self.trusted_authority_hosts {
			if security::canonicalize_dns_name(host).as_deref() != Some(host.as_str()) {
				return Err(Error::invalid_argument(
					"trusted_authority_hosts",
					"Entries must be canonical hostnames (lowercase, no trailing dot).",
				));
			}
		}

		Ok(())
	}
}
impl Default for Settings {
	fn default() -> Self {
		Self {
			expiration_buffer: DEFAULT_EXPIRATION_BUFFER,
			require_https: true,
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
			max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
			drs_cloud_resolver: default_drs_cloud_resolver(),
			instance_discovery_host: default_instance_discovery_host(),
			trusted_authority_hosts: default_trusted_authority_hosts(),
		}
	}
}

fn default_true() -> bool {
	true
}

fn default_expiration_buffer() -> Duration {
	DEFAULT_EXPIRATION_BUFFER
}

fn default_request_timeout() -> Duration {
	DEFAULT_REQUEST_TIMEOUT
}

fn default_max_response_bytes() -> u64 {
	DEFAULT_MAX_RESPONSE_BYTES
}

fn default_drs_cloud_resolver() -> Url {
	Url::parse(DEFAULT_DRS_CLOUD_RESOLVER).expect("default DRS resolver must be a valid URL")
}

fn default_instance_discovery_host() -> String {
	DEFAULT_INSTANCE_DISCOVERY_HOST.into()
}

fn default_trusted_authority_hosts() -> Vec<String> {
	DEFAULT_TRUSTED_AUTHORITY_HOSTS.iter().map(|host| (*host).to_owned()).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_are_valid() {
		let settings = Settings::default();

		settings.validate().expect("default settings");

		assert_eq!(settings.expiration_buffer, Duration::from_secs(300));
		assert!(settings.is_trusted_authority_host("Login.Windows.Net"));
		assert!(!settings.is_trusted_authority_host("login.contoso.com"));
	}

	#[test]
	fn deserialization_fills_defaults_and_normalizes_hosts() {
		let settings: Settings = serde_json::from_str(
			r#"{ "require_https": false, "trusted_authority_hosts": ["Login.Contoso.COM."] }"#,
		)
		.expect("settings");

		assert!(!settings.require_https);
		assert_eq!(settings.trusted_authority_hosts, vec!["login.contoso.com"]);
		assert_eq!(settings.drs_cloud_resolver.as_str(), DEFAULT_DRS_CLOUD_RESOLVER);
		settings.validate().expect("valid settings");
	}

	#[test]
	fn validation_rejects_bad_values() {
		let short_timeout = Settings::default().with_request_timeout(Duration::from_millis(10));

		assert!(matches!(
			short_timeout.validate(),
			Err(Error::InvalidArgument { field: "request_timeout", .. })
		));

		let plaintext = Settings::default()
			.with_drs_cloud_resolver("http://enterpriseregistration.windows.net/")
			.expect("url");

		assert!(matches!(plaintext.validate(), Err(Error::Security(_))));
		assert!(plaintext.with_require_https(false).validate().is_ok());

		let no_slash = Settings::default()
			.with_drs_cloud_resolver("https://enterpriseregistration.windows.net/drs")
			.expect("url");

		assert!(matches!(
			no_slash.validate(),
			Err(Error::InvalidArgument { field: "drs_cloud_resolver", .. })
		));
	}
}
