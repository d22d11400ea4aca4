//! Client-side identity plumbing: a canonical token cache with pluggable stores, an authority alias
//! cache fed by instance discovery, and DRS plus WebFinger federation trust validation.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod authority;
pub mod cache;
pub mod config;
pub mod federation;
pub mod http;
pub mod security;

mod error;
mod _prelude {
	pub use std::{sync::Arc, time::Duration};

	pub use chrono::{DateTime, TimeDelta, Utc};
	pub use tokio::time::Instant;

	pub use crate::{Error, Result};
}

pub use crate::{
	authority::{
		alias::{AuthorityAliasCache, InstanceDiscoveryMetadata, InstanceDiscoveryResponse},
		discovery::{AuthorityValidator, InstanceDiscoveryRequestor},
	},
	cache::{
		delegating::{DelegatingTokenCacheStore, ReplicaCache},
		file::FileTokenCacheStore,
		item::{TokenCacheItem, TokenEntryKind, TokenResponse, UserInfo},
		key::{CacheKey, TokenRequest},
		memory::MemoryTokenCacheStore,
		store::{TokenCacheQuery, TokenCacheStore},
	},
	config::Settings,
	error::{Error, Result},
	federation::{
		drs::{DrsMetadata, DrsRequestor, Resolution},
		trust::{FederationTrustValidator, TrustDecision, realm_is_trusted},
		webfinger::{WebFingerMetadata, WebFingerRequestor},
	},
	http::{
		client::{HttpResponse, HttpTransport, ReqwestTransport},
		requestor::{MetadataClient, MetadataRequestor},
	},
};
