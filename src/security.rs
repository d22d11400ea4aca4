//! Security utilities covering HTTPS enforcement, host canonicalisation, and log-safe fingerprints.
//!
//! # Threat Model
//! Authority hosts and cache keys flow in from callers and from upstream discovery documents. These
//! helpers keep host comparison stable (case, trailing dots, whitespace), refuse plaintext endpoints
//! when HTTPS is required, and keep user identifiers embedded in cache keys out of log output.

// std
use std::collections::HashSet;
// crates.io
use base64::prelude::*;
use serde::{Deserialize, de::Deserializer};
use sha2::{Digest, Sha256};
use url::Url;
// self
use crate::_prelude::*;

/// Number of digest bytes retained in a log fingerprint.
const FINGERPRINT_BYTES: usize = 9;

/// Canonicalise a DNS name by trimming whitespace, removing any trailing dot, and lowercasing.
pub fn canonicalize_dns_name(value: &str) -> Option<String> {
	let trimmed = value.trim();
	if trimmed.is_empty() {
		return None;
	}

	let without_trailing_dot = trimmed.trim_end_matches('.');
	if without_trailing_dot.is_empty() {
		return None;
	}

	Some(without_trailing_dot.to_ascii_lowercase())
}

/// Normalise a host list by canonicalising entries and removing duplicates/empties.
pub fn normalize_hosts(hosts: Vec<String>) -> Vec<String> {
	let mut seen = HashSet::new();
	let mut normalized = Vec::with_capacity(hosts.len());

	for host in hosts {
		if let Some(canonical) = canonicalize_dns_name(&host)
			&& seen.insert(canonical.clone())
		{
			normalized.push(canonical);
		}
	}

	normalized
}

/// `serde` helper to normalise host lists during deserialisation.
pub fn deserialize_hosts<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = Vec::<String>::deserialize(deserializer)?;

	Ok(normalize_hosts(raw))
}

/// Ensure the provided URL uses HTTPS.
pub fn enforce_https(url: &Url) -> Result<()> {
	if url.scheme() == "https" {
		Ok(())
	} else {
		Err(Error::Security(format!("Upstream URL {url} must use HTTPS.")))
	}
}

/// Canonical host of a URL, if it carries one.
pub fn url_host(url: &Url) -> Option<String> {
	url.host_str().and_then(canonicalize_dns_name)
}

/// Short, non-reversible fingerprint of a sensitive value for log correlation.
///
/// Cache keys embed user identifiers; log this instead of the raw key.
pub fn fingerprint(value: &str) -> String {
	let digest = Sha256::digest(value.as_bytes());

	BASE64_URL_SAFE_NO_PAD.encode(&digest[..FINGERPRINT_BYTES])
}
