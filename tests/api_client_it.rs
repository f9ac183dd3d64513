#![cfg(feature = "reqwest")]

mod common;

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use serde::{Deserialize, Serialize};
// self
use livestream_rest::{
	auth::{ClientId, OAuthToken, PlatformId},
	client::ApiClient,
	connection::{Connection, OAuthConnection},
	error::{Error, TokenEndpointError},
	http::ReqwestHttpClient,
	logger::Logger,
	pagination::PaginationConfig,
	platform::PlatformDescriptor,
	url::Url,
};

#[derive(Debug, Default, PartialEq, Eq, Deserialize)]
struct Broadcast {
	id: String,
	title: String,
}

#[derive(Serialize)]
struct BroadcastUpdate<'a> {
	title: &'a str,
}

fn token(access: &str, expires_in: i64) -> OAuthToken {
	OAuthToken::builder(ClientId::new("client-api").expect("Client identifier should be valid."))
		.client_secret("secret-api")
		.access_token(access)
		.refresh_token("refresh-api")
		.expires_in(expires_in)
		.build()
		.expect("Token fixture should build successfully.")
}

fn build_client(
	server: &MockServer,
	token: Option<OAuthToken>,
) -> (ApiClient<ReqwestHttpClient>, Arc<OAuthConnection<ReqwestHttpClient>>) {
	let descriptor = PlatformDescriptor::builder(
		PlatformId::new("mock-api").expect("Platform identifier should be valid."),
	)
	.token_endpoint(Url::parse(&server.url("/token")).expect("Mock token endpoint should parse."))
	.build()
	.expect("Platform descriptor should build successfully.");
	let logger = Arc::new(Logger::new());
	let mut connection =
		OAuthConnection::with_http_client(descriptor, common::test_http_client())
			.with_logger(logger.clone());

	if let Some(token) = token {
		connection = connection.with_token(token);
	}

	let connection = Arc::new(connection);
	let client = ApiClient::from_connection(
		Url::parse(&server.url("/v1/")).expect("Mock base address should parse."),
		connection.clone(),
	)
	.expect("API client should build successfully.")
	.with_logger(logger);

	(client, connection)
}

#[tokio::test]
async fn get_sends_bearer_and_decodes_json() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let (client, _) = build_client(&server, Some(token("access-live", 3600)));
	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v1/broadcasts")
				.query_param("id", "b-1")
				.header("authorization", "Bearer access-live")
				.header("accept", "application/json");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"id\":\"b-1\",\"title\":\"Launch\"}");
		})
		.await;
	let broadcast: Broadcast = client.get("broadcasts?id=b-1").await?;

	mock.assert_async().await;

	assert_eq!(broadcast, Broadcast { id: "b-1".into(), title: "Launch".into() });

	Ok(())
}

#[tokio::test]
async fn put_sends_json_body_and_accepts_empty_response() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let (client, _) = build_client(&server, Some(token("access-live", 3600)));
	let mock = server
		.mock_async(|when, then| {
			when.method(PUT)
				.path("/v1/broadcasts/b-1")
				.header("content-type", "application/json")
				.body("{\"title\":\"Renamed\"}");
			then.status(204);
		})
		.await;
	let updated: Option<Broadcast> =
		client.put("broadcasts/b-1", &BroadcastUpdate { title: "Renamed" }).await?;

	mock.assert_async().await;

	assert!(updated.is_none());

	Ok(())
}

#[tokio::test]
async fn failure_snapshot_keeps_status_and_raw_body() {
	let server = MockServer::start_async().await;
	let (client, _) = build_client(&server, Some(token("access-live", 3600)));
	let _mock = server
		.mock_async(|when, then| {
			when.method(DELETE).path("/v1/broadcasts/b-9");
			then.status(403).body("{\"message\":\"forbidden\"}");
		})
		.await;
	let err = client.delete::<()>("broadcasts/b-9").await.expect_err("403 must surface.");
	let request = err.as_request().expect("HTTP failures surface as RequestError.");

	assert_eq!(request.method, "DELETE");
	assert_eq!(request.url, server.url("/v1/broadcasts/b-9"));
	assert_eq!(request.status, 403);
	assert_eq!(request.reason, "Forbidden");
	assert_eq!(request.body, "{\"message\":\"forbidden\"}");
}

#[tokio::test]
async fn expired_token_is_refreshed_before_the_call() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let (client, connection) = build_client(&server, Some(token("access-stale", 0)));
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"access-fresh\",\"token_type\":\"bearer\",\"expires_in\":3600}");
		})
		.await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v1/broadcasts/b-1")
				.header("authorization", "Bearer access-fresh");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"id\":\"b-1\",\"title\":\"Fresh\"}");
		})
		.await;
	let (first, second) = tokio::join!(
		client.get::<Broadcast>("broadcasts/b-1"),
		client.get::<Broadcast>("broadcasts/b-1"),
	);

	assert_eq!(first?.title, "Fresh");
	assert_eq!(second?.title, "Fresh");

	token_mock.assert_calls_async(1).await;
	api_mock.assert_calls_async(2).await;

	assert_eq!(
		connection.token().map(|token| token.access_token().expose().to_owned()).as_deref(),
		Some("access-fresh")
	);

	Ok(())
}

#[tokio::test]
async fn refresh_failure_surfaces_as_authentication_expired() {
	let server = MockServer::start_async().await;
	let (client, _) = build_client(&server, Some(token("access-stale", 0)));
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\"}");
		})
		.await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/broadcasts");
			then.status(200).body("{}");
		})
		.await;
	let err = client.get::<Broadcast>("broadcasts").await.expect_err("Refresh must fail.");

	match err {
		Error::AuthenticationExpired { source } => match source.root() {
			TokenEndpointError::Rejected { error, .. } => assert_eq!(error, "invalid_grant"),
			other => panic!("Unexpected refresh failure: {other:?}."),
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}

	token_mock.assert_calls_async(1).await;
	api_mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn missing_token_never_reaches_the_network() {
	let server = MockServer::start_async().await;
	let (client, _) = build_client(&server, None);
	let api_mock = server
		.mock_async(|when, then| {
			when.path("/v1/broadcasts");
			then.status(200);
		})
		.await;

	assert!(matches!(
		client.get::<Broadcast>("broadcasts").await,
		Err(Error::AuthenticationMissing)
	));

	api_mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn single_page_listing_keeps_existing_query() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let (client, _) = build_client(&server, Some(token("access-live", 3600)));
	let client = client.with_pagination(PaginationConfig::default().with_size_param("maxResults"));
	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v1/liveChat/messages")
				.query_param("part", "snippet")
				.query_param("maxResults", "25");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"items\":[\"m1\",\"m2\"],\"nextPageToken\":\"\"}");
		})
		.await;
	let messages: Vec<String> = client.fetch_page("liveChat/messages?part=snippet", 25).await?;

	mock.assert_calls_async(1).await;

	assert_eq!(messages, ["m1", "m2"]);

	Ok(())
}
