//! Federation trust validation against mock DRS and WebFinger endpoints.

// crates.io
use identity_cache::{
	Error, FederationTrustValidator, MetadataClient, ReqwestTransport, Result, TrustDecision,
};
use url::Url;
use uuid::Uuid;
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{header, header_exists, method, path, query_param},
};
// self
use crate::mock_settings;

// `.invalid` never resolves, so the on-prem leg always falls back to the mock cloud resolver.
const DOMAIN: &str = "contoso.invalid";
const AUTHORITY: &str = "https://fs.contoso.invalid/adfs";

async fn mount_drs(server: &MockServer, status: u16) {
	let body = format!(
		r#"{{ "IdentityProviderService": {{ "PassiveAuthEndpoint": "{}/adfs/ls" }} }}"#,
		server.uri()
	);

	Mock::given(method("GET"))
		.and(path(format!("/{DOMAIN}/enrollmentserver/contract")))
		.and(query_param("api-version", "1.0"))
		.and(header("accept", "application/json"))
		.and(header_exists("client-request-id"))
		.respond_with(ResponseTemplate::new(status).set_body_string(body))
		.expect(1)
		.mount(server)
		.await;
}

fn validator(server: &MockServer) -> Result<FederationTrustValidator<ReqwestTransport>> {
	let settings = mock_settings().with_drs_cloud_resolver(format!("{}/", server.uri()))?;
	let client = MetadataClient::new(ReqwestTransport::new(&settings)?, &settings)
		.with_correlation_id(Uuid::new_v4());

	Ok(FederationTrustValidator::new(client, &settings))
}

#[tokio::test]
async fn trusted_realm_is_found_after_cloud_fallback() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	mount_drs(&server, 200).await;

	Mock::given(method("GET"))
		.and(path("/.well-known/webfinger"))
		.and(query_param("resource", AUTHORITY))
		.respond_with(ResponseTemplate::new(200).set_body_string(
			r#"{
				"subject": "https://fs.contoso.invalid",
				"links": [
					{ "rel": "http://schemas.microsoft.com/rel/trusted-realm", "href": "not a url" },
					{ "rel": "http://schemas.microsoft.com/rel/trusted-realm", "href": "https://FS.contoso.invalid" }
				]
			}"#,
		))
		.expect(1)
		.mount(&server)
		.await;

	let decision = validator(&server)?.validate(&Url::parse(AUTHORITY)?, DOMAIN).await?;

	assert_eq!(decision, TrustDecision::Trusted);

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn realm_without_matching_link_is_not_trusted() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	mount_drs(&server, 200).await;

	Mock::given(method("GET"))
		.and(path("/.well-known/webfinger"))
		.respond_with(ResponseTemplate::new(200).set_body_string(
			r#"{ "subject": "s", "links": [ { "rel": "http://schemas.microsoft.com/rel/trusted-realm", "href": "https://fs.fabrikam.com" } ] }"#,
		))
		.expect(1)
		.mount(&server)
		.await;

	let decision = validator(&server)?.validate(&Url::parse(AUTHORITY)?, DOMAIN).await?;

	assert_eq!(decision, TrustDecision::NotTrusted);

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn webfinger_failure_is_never_trusted() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	mount_drs(&server, 200).await;

	Mock::given(method("GET"))
		.and(path("/.well-known/webfinger"))
		.respond_with(ResponseTemplate::new(404))
		.expect(1)
		.mount(&server)
		.await;

	assert!(!validator(&server)?.is_trusted(&Url::parse(AUTHORITY)?, DOMAIN).await);

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn cloud_drs_error_is_a_fetch_failure() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	mount_drs(&server, 503).await;

	let err = validator(&server)?
		.validate(&Url::parse(AUTHORITY)?, DOMAIN)
		.await
		.expect_err("cloud DRS failure");

	assert!(matches!(err, Error::HttpStatus { .. }), "{err}");
	assert!(err.is_fetch_error());

	server.verify().await;

	Ok(())
}
