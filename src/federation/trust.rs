//! Realm trust decision and the federation validator that drives it.

// crates.io
use url::Url;
// self
use crate::{
	_prelude::*,
	config::Settings,
	federation::{
		drs::DrsRequestor,
		webfinger::{WebFingerMetadata, WebFingerRequest, WebFingerRequestor},
	},
	http::{
		client::HttpTransport,
		requestor::{MetadataClient, MetadataRequestor},
	},
};

/// Link relation asserting a trusted realm. Compared exactly.
pub const TRUSTED_REALM_REL: &str = "http://schemas.microsoft.com/rel/trusted-realm";

/// Outcome of a realm trust check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrustDecision {
	/// A trusted-realm link matches the authority.
	Trusted,
	/// No link matches; this is a well-formed negative answer, not a failure.
	NotTrusted,
}
impl TrustDecision {
	/// Whether trust was established.
	pub fn is_trusted(self) -> bool {
		matches!(self, Self::Trusted)
	}
}

/// Whether `metadata` carries a trusted-realm link for `authority`.
///
/// A link matches when its `href` has the authority's scheme and `host[:port]` (both compared
/// case-insensitively) and its `rel` is exactly [`TRUSTED_REALM_REL`]. Links with a missing or
/// unparsable `href` or `rel` are skipped.
pub fn realm_is_trusted(authority: &Url, metadata: &WebFingerMetadata) -> bool {
	tracing::trace!(%authority, links = metadata.links().len(), "verifying realm trust");

	metadata.links().iter().any(|link| {
		let (Some(rel), Some(href)) = (link.rel.as_deref(), link.href.as_deref()) else {
			return false;
		};
		let href = match Url::parse(href) {
			Ok(href) => href,
			Err(err) => {
				tracing::debug!(error = %err, "skipping WebFinger link with malformed href");

				return false;
			},
		};

		href.scheme().eq_ignore_ascii_case(authority.scheme())
			&& href.authority().eq_ignore_ascii_case(authority.authority())
			&& rel == TRUSTED_REALM_REL
	})
}

/// Decides whether a federation endpoint is trusted by an authority via DRS and WebFinger.
///
/// Decisions are never cached; every call re-fetches both documents.
#[derive(Clone, Debug)]
pub struct FederationTrustValidator<T> {
	drs: DrsRequestor<T>,
	webfinger: WebFingerRequestor<T>,
}
impl<T> FederationTrustValidator<T>
where
	T: HttpTransport + Clone,
{
	/// Build a validator whose requestors share `client`.
	pub fn new(client: MetadataClient<T>, settings: &Settings) -> Self {
		Self {
			drs: DrsRequestor::new(client.clone(), settings),
			webfinger: WebFingerRequestor::new(client),
		}
	}

	/// DRS requestor used for the first leg.
	pub fn drs(&self) -> &DrsRequestor<T> {
		&self.drs
	}

	/// Run DRS discovery for `domain`, fetch WebFinger from its federation endpoint, and check
	/// the trusted-realm links against `authority`.
	#[tracing::instrument(skip(self), fields(authority = %authority))]
	pub async fn validate(&self, authority: &Url, domain: &str) -> Result<TrustDecision> {
		let drs_metadata = self.drs.request_drs_discovery(domain).await?;
		let webfinger = self
			.webfinger
			.request_metadata(WebFingerRequest { authority: authority.clone(), drs_metadata })
			.await?;
		let decision = if realm_is_trusted(authority, &webfinger) {
			TrustDecision::Trusted
		} else {
			TrustDecision::NotTrusted
		};

		tracing::debug!(?decision, "federation trust evaluated");

		Ok(decision)
	}

	/// Like [`Self::validate`], but every failure counts as not trusted.
	pub async fn is_trusted(&self, authority: &Url, domain: &str) -> bool {
		match self.validate(authority, domain).await {
			Ok(decision) => decision.is_trusted(),
			Err(err) => {
				tracing::warn!(
					%authority,
					domain,
					error = %err,
					"federation trust not established"
				);

				false
			},
		}
	}
}
