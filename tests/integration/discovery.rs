//! Authority validation through instance discovery.

// crates.io
use identity_cache::{
	AuthorityAliasCache, AuthorityValidator, Error, MetadataClient, Result, Settings,
};
use url::Url;
use uuid::Uuid;
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{header, method, path, query_param},
};
// self
use crate::Rebase;

const DISCOVERY_BODY: &str = r#"{
	"tenant_discovery_endpoint": "https://login.microsoftonline.com/contoso/v2.0/.well-known/openid-configuration",
	"api-version": "1.1",
	"metadata": [
		{
			"preferred_network": "login.microsoftonline.com",
			"preferred_cache": "login.windows.net",
			"aliases": ["login.microsoftonline.com", "login.windows.net", "login.microsoft.com", "sts.windows.net"]
		}
	]
}"#;

#[tokio::test]
async fn validated_authority_registers_every_alias_once() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;
	let correlation_id = Uuid::new_v4();

	Mock::given(method("GET"))
		.and(path("/common/discovery/instance"))
		.and(query_param("api-version", "1.1"))
		.and(query_param(
			"authorization_endpoint",
			"https://login.windows.net/common/oauth2/authorize",
		))
		.and(header("client-request-id", correlation_id.to_string().as_str()))
		.and(header("return-client-request-id", "true"))
		.respond_with(ResponseTemplate::new(200).set_body_string(DISCOVERY_BODY))
		.expect(1)
		.mount(&server)
		.await;

	let settings = Settings::default();
	let cache = AuthorityAliasCache::new();
	let client = MetadataClient::new(Rebase::new(&server.uri()), &settings)
		.with_correlation_id(correlation_id);
	let validator = AuthorityValidator::new(client, cache.clone(), &settings);
	let authority = Url::parse("https://login.windows.net/contoso.onmicrosoft.com")?;
	let metadata = validator.validate(&authority).await?;

	assert!(metadata.is_validated());
	assert_eq!(metadata.preferred_network(), Some("login.microsoftonline.com"));

	validator.validate(&Url::parse("https://sts.windows.net/contoso.onmicrosoft.com")?).await?;

	assert!(cache.is_validated("login.microsoft.com"));
	assert_eq!(cache.aliases("sts.windows.net").len(), 4);
	assert_eq!(
		cache.preferred_cache_authority(&Url::parse("https://login.microsoftonline.com/contoso")?)?,
		Url::parse("https://login.windows.net/contoso")?
	);

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn rejected_authority_is_not_cached() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/common/discovery/instance"))
		.and(query_param(
			"authorization_endpoint",
			"https://login.contoso.com/common/oauth2/authorize",
		))
		.respond_with(ResponseTemplate::new(400).set_body_string(
			r#"{ "error": "invalid_instance", "error_description": "AADSTS50049: Unknown or invalid instance.", "error_codes": [50049] }"#,
		))
		.expect(2)
		.mount(&server)
		.await;

	let settings = Settings::default();
	let cache = AuthorityAliasCache::new();
	let validator = AuthorityValidator::new(
		MetadataClient::new(Rebase::new(&server.uri()), &settings),
		cache.clone(),
		&settings,
	);
	let authority = Url::parse("https://login.contoso.com/tenant")?;

	for _ in 0..2 {
		let err = validator.validate(&authority).await.expect_err("rejected authority");

		assert!(matches!(err, Error::InvalidAuthority { .. }), "{err}");
	}

	assert!(cache.is_empty());

	server.verify().await;

	Ok(())
}
