//! Crate-wide error types and `Result` alias.

// std
use std::path::PathBuf;

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the identity cache crate.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	Serde(#[from] serde_json::Error),
	#[error(transparent)]
	Url(#[from] url::ParseError),

	#[error("Persisted token cache at {path:?} cannot be loaded: {reason}")]
	CorruptCache { path: PathBuf, reason: String },
	#[error("Host '{host}' could not be resolved.")]
	HostUnresolved { host: String },
	#[error("Upstream HTTP status {status} from {url}: {body:?}")]
	HttpStatus { status: http::StatusCode, url: url::Url, body: Option<String> },
	#[error("Invalid argument {field}: {reason}")]
	InvalidArgument { field: &'static str, reason: String },
	#[error("Authority {authority} is not a valid instance: {reason}")]
	InvalidAuthority { authority: String, reason: String },
	#[error("Metadata fetch from {url} failed: {reason}")]
	MetadataFetch { url: url::Url, reason: String },
	#[error("Malformed {document} document: {reason}")]
	MetadataParse { document: &'static str, reason: String },
	#[error("Security violation: {0}")]
	Security(String),
}
impl Error {
	/// Whether the error stems from the transport or an upstream status code.
	pub fn is_fetch_error(&self) -> bool {
		matches!(
			self,
			Self::Reqwest(_)
				| Self::HostUnresolved { .. }
				| Self::HttpStatus { .. }
				| Self::MetadataFetch { .. }
		)
	}

	/// Whether the error stems from a malformed document.
	pub fn is_parse_error(&self) -> bool {
		matches!(self, Self::Serde(_) | Self::MetadataParse { .. } | Self::CorruptCache { .. })
	}

	pub(crate) fn invalid_argument(field: &'static str, reason: impl Into<String>) -> Self {
		Self::InvalidArgument { field, reason: reason.into() }
	}

	pub(crate) fn parse(document: &'static str, err: impl std::fmt::Display) -> Self {
		Self::MetadataParse { document, reason: err.to_string() }
	}
}
