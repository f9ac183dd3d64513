//! Authenticated REST request execution.
//!
//! An [`ApiClient`] binds one base address to a [`Connection`] and a transport. Platform services
//! issue calls through [`ApiClient::execute`] (or the verb helpers) and receive either the decoded
//! body or a typed [`Error`].

// crates.io
use oauth2::{
	AsyncHttpClient,
	http::{
		Method, Request,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
	},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	connection::{Connection, OAuthConnection},
	error::{ConfigError, RequestError},
	http::{self, HttpClient},
	logger::{LogLevel, Logger},
	obs::{self, OpKind, OpOutcome, OpSpan},
	pagination::PaginationConfig,
	platform,
};

const APPLICATION_JSON: &str = "application/json";

/// REST client for one platform API generation.
pub struct ApiClient<C>
where
	C: HttpClient,
{
	base_address: Url,
	http_client: Arc<C>,
	connection: Option<Arc<dyn Connection>>,
	logger: Arc<Logger>,
	pagination: PaginationConfig,
}
impl<C> ApiClient<C>
where
	C: HttpClient,
{
	/// Creates a client that authenticates through `connection`.
	///
	/// `base_address` must be absolute, end with `/`, and use HTTPS unless it targets a loopback
	/// host.
	pub fn new(
		base_address: Url,
		connection: Arc<dyn Connection>,
		http_client: impl Into<Arc<C>>,
	) -> Result<Self> {
		let mut client = Self::without_connection(base_address, http_client)?;

		client.connection = Some(connection);

		Ok(client)
	}

	/// Creates a client with no connection; every call fails with
	/// [`Error::AuthenticationMissing`].
	pub fn without_connection(base_address: Url, http_client: impl Into<Arc<C>>) -> Result<Self> {
		if base_address.cannot_be_a_base() || !base_address.path().ends_with('/') {
			return Err(ConfigError::InvalidBaseAddress { url: base_address.to_string() }.into());
		}

		platform::validate_endpoint("api", &base_address).map_err(ConfigError::from)?;

		Ok(Self {
			base_address,
			http_client: http_client.into(),
			connection: None,
			logger: Logger::global(),
			pagination: PaginationConfig::default(),
		})
	}

	/// Creates a client sharing the transport of an [`OAuthConnection`].
	pub fn from_connection(base_address: Url, connection: Arc<OAuthConnection<C>>) -> Result<Self> {
		let http_client = connection.http_client();

		Self::new(base_address, connection, http_client)
	}

	/// Routes diagnostics to `logger` instead of [`Logger::global`].
	pub fn with_logger(mut self, logger: Arc<Logger>) -> Self {
		self.logger = logger;

		self
	}

	/// Overrides the listing query parameters and page ceiling.
	pub fn with_pagination(mut self, pagination: PaginationConfig) -> Self {
		self.pagination = pagination;

		self
	}

	/// Base address every request path is resolved against.
	pub fn base_address(&self) -> &Url {
		&self.base_address
	}

	/// Connection supplying tokens, if any.
	pub fn connection(&self) -> Option<&Arc<dyn Connection>> {
		self.connection.as_ref()
	}

	/// Logger receiving this client's diagnostics.
	pub fn logger(&self) -> &Arc<Logger> {
		&self.logger
	}

	/// Listing configuration used by [`fetch_page`](Self::fetch_page).
	pub fn pagination(&self) -> &PaginationConfig {
		&self.pagination
	}

	/// Performs one authenticated request and decodes the JSON response into `T`.
	///
	/// An expired token is refreshed first when `auto_refresh` is set; otherwise it is sent as-is
	/// and the platform decides. A successful response with an empty body yields `T::default()`.
	pub async fn execute<T, B>(
		&self,
		method: Method,
		path: &str,
		body: Option<&B>,
		auto_refresh: bool,
	) -> Result<T>
	where
		T: DeserializeOwned + Default,
		B: ?Sized + Serialize + Sync,
	{
		let url = self.resolve(path)?;
		let body = body
			.map(serde_json::to_vec)
			.transpose()
			.map_err(ConfigError::EncodeBody)?;

		self.send(method, url, body, auto_refresh).await
	}

	/// `GET path` with automatic refresh.
	pub async fn get<T>(&self, path: &str) -> Result<T>
	where
		T: DeserializeOwned + Default,
	{
		self.execute::<T, ()>(Method::GET, path, None, true).await
	}

	/// `POST path` with a JSON body and automatic refresh.
	pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
	where
		T: DeserializeOwned + Default,
		B: ?Sized + Serialize + Sync,
	{
		self.execute(Method::POST, path, Some(body), true).await
	}

	/// `PUT path` with a JSON body and automatic refresh.
	pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
	where
		T: DeserializeOwned + Default,
		B: ?Sized + Serialize + Sync,
	{
		self.execute(Method::PUT, path, Some(body), true).await
	}

	/// `PATCH path` with a JSON body and automatic refresh.
	pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T>
	where
		T: DeserializeOwned + Default,
		B: ?Sized + Serialize + Sync,
	{
		self.execute(Method::PATCH, path, Some(body), true).await
	}

	/// `DELETE path` with automatic refresh.
	pub async fn delete<T>(&self, path: &str) -> Result<T>
	where
		T: DeserializeOwned + Default,
	{
		self.execute::<T, ()>(Method::DELETE, path, None, true).await
	}

	pub(crate) fn resolve(&self, path: &str) -> Result<Url> {
		self.base_address
			.join(path)
			.map_err(|source| ConfigError::InvalidPath { path: path.to_owned(), source }.into())
	}

	pub(crate) async fn send<T>(
		&self,
		method: Method,
		url: Url,
		body: Option<Vec<u8>>,
		auto_refresh: bool,
	) -> Result<T>
	where
		T: DeserializeOwned + Default,
	{
		const KIND: OpKind = OpKind::Execute;

		let span = OpSpan::new(KIND, "send");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span.instrument(self.send_inner(method, url, body, auto_refresh)).await;

		obs::record_op_outcome(KIND, OpOutcome::of(&result));

		result
	}

	async fn send_inner<T>(
		&self,
		method: Method,
		url: Url,
		body: Option<Vec<u8>>,
		auto_refresh: bool,
	) -> Result<T>
	where
		T: DeserializeOwned + Default,
	{
		let connection = self.connection.as_ref().ok_or(Error::AuthenticationMissing)?;
		let token = connection
			.get_token(auto_refresh)
			.await
			.map_err(|source| Error::AuthenticationExpired { source })?
			.ok_or(Error::AuthenticationMissing)?;
		let mut request = Request::builder()
			.method(method.clone())
			.uri(url.as_str())
			.header(AUTHORIZATION, format!("Bearer {}", token.access_token().expose()))
			.header(ACCEPT, APPLICATION_JSON);

		if body.is_some() {
			request = request.header(CONTENT_TYPE, APPLICATION_JSON);
		}

		let request = request.body(body.unwrap_or_default()).map_err(ConfigError::from)?;

		self.logger.log(LogLevel::Debug, format!("{method} {url}"));

		let handle = self.http_client.handle();
		let response = match handle.call(request).await {
			Ok(response) => response,
			Err(err) => {
				let err = Error::from(http::map_http_client_error(url.as_str(), err));

				self.logger.log_error(&err);

				return Err(err);
			},
		};
		let status = response.status();

		if !status.is_success() {
			let err = RequestError::new(
				method.as_str(),
				url.as_str(),
				status.as_u16(),
				status.canonical_reason().unwrap_or_default(),
				response.into_body(),
			);

			self.logger.log(LogLevel::Warning, err.describe());

			return Err(err.into());
		}

		decode(&url, response.body())
	}
}
impl<C> Clone for ApiClient<C>
where
	C: HttpClient,
{
	fn clone(&self) -> Self {
		Self {
			base_address: self.base_address.clone(),
			http_client: self.http_client.clone(),
			connection: self.connection.clone(),
			logger: self.logger.clone(),
			pagination: self.pagination.clone(),
		}
	}
}
impl<C> Debug for ApiClient<C>
where
	C: HttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("base_address", &self.base_address.as_str())
			.field("authenticated", &self.connection.is_some())
			.field("pagination", &self.pagination)
			.finish()
	}
}

fn decode<T>(url: &Url, body: &[u8]) -> Result<T>
where
	T: DeserializeOwned + Default,
{
	if body.iter().all(u8::is_ascii_whitespace) {
		return Ok(T::default());
	}

	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| Error::Decode { url: url.to_string(), source })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::{FakeConnection, FakeHttpClient, FakeResponse, expiring_token, test_client};

	#[derive(Debug, Default, PartialEq, Eq, Deserialize)]
	struct Stream {
		id: String,
		viewers: u32,
	}

	#[tokio::test]
	async fn execute_sends_bearer_and_decodes_body() {
		let http = FakeHttpClient::with_responses([FakeResponse::json(
			200,
			r#"{"id":"abc","viewers":7}"#,
		)]);
		let connection = FakeConnection::with_token(expiring_token("access-1", 3600));
		let client = test_client(http.clone(), Some(connection.clone()));
		let stream: Stream = client
			.execute(Method::POST, "streams?id=abc", Some(&serde_json::json!({"title":"hi"})), true)
			.await
			.expect("Request should succeed.");

		assert_eq!(stream, Stream { id: "abc".into(), viewers: 7 });

		let sent = http.requests();

		assert_eq!(sent.len(), 1);
		assert_eq!(sent[0].method, "POST");
		assert_eq!(sent[0].url, "https://api.example.com/v1/streams?id=abc");
		assert_eq!(sent[0].authorization.as_deref(), Some("Bearer access-1"));
		assert_eq!(sent[0].content_type.as_deref(), Some(APPLICATION_JSON));
		assert_eq!(sent[0].body, br#"{"title":"hi"}"#);
		assert_eq!(connection.refresh_count(), 0);
	}

	#[tokio::test]
	async fn non_success_produces_request_error_snapshot() {
		let http = FakeHttpClient::with_responses([FakeResponse::json(404, "{\"error\":\"gone\"}")]);
		let client =
			test_client(http, Some(FakeConnection::with_token(expiring_token("access", 3600))));
		let err = client.get::<Stream>("streams").await.expect_err("404 must fail.");
		let request = err.as_request().expect("HTTP failures surface as RequestError.");

		assert_eq!(request.method, "GET");
		assert_eq!(request.url, "https://api.example.com/v1/streams");
		assert_eq!(request.status, 404);
		assert_eq!(request.reason, "Not Found");
		assert_eq!(request.body, "{\"error\":\"gone\"}");
	}

	#[tokio::test]
	async fn missing_connection_or_token_fails_without_network() {
		let http = FakeHttpClient::default();
		let detached = test_client(http.clone(), None);

		assert!(matches!(
			detached.get::<Stream>("streams").await,
			Err(Error::AuthenticationMissing)
		));

		let empty = test_client(http.clone(), Some(FakeConnection::empty()));

		assert!(matches!(empty.get::<Stream>("streams").await, Err(Error::AuthenticationMissing)));
		assert!(http.requests().is_empty());
	}

	#[tokio::test]
	async fn expired_token_is_refreshed_once_before_sending() {
		let http = FakeHttpClient::with_responses([FakeResponse::json(200, "")]);
		let connection = FakeConnection::with_token(expiring_token("stale", 0))
			.refreshing_to(expiring_token("fresh", 3600));
		let client = test_client(http.clone(), Some(connection.clone()));
		let value: Option<Stream> =
			client.get("streams").await.expect("Refreshed request should succeed.");

		assert_eq!(value, None);
		assert_eq!(connection.refresh_count(), 1);
		assert_eq!(http.requests()[0].authorization.as_deref(), Some("Bearer fresh"));
	}

	#[tokio::test]
	async fn failed_refresh_surfaces_authentication_expired() {
		let http = FakeHttpClient::default();
		let connection = FakeConnection::with_token(expiring_token("stale", 0));
		let client = test_client(http.clone(), Some(connection));
		let err = client.get::<Stream>("streams").await.expect_err("Refresh must fail.");

		assert!(matches!(err, Error::AuthenticationExpired { .. }));
		assert!(err.is_authentication());
		assert!(http.requests().is_empty());
	}

	#[tokio::test]
	async fn expired_token_is_sent_when_auto_refresh_is_off() {
		let http = FakeHttpClient::with_responses([FakeResponse::json(401, "expired")]);
		let connection = FakeConnection::with_token(expiring_token("stale", 0));
		let client = test_client(http.clone(), Some(connection.clone()));
		let err = client
			.execute::<Stream, ()>(Method::GET, "streams", None, false)
			.await
			.expect_err("Platform rejects the stale token.");

		assert_eq!(err.as_request().map(|request| request.status), Some(401));
		assert_eq!(connection.refresh_count(), 0);
		assert_eq!(http.requests()[0].authorization.as_deref(), Some("Bearer stale"));
	}

	#[tokio::test]
	async fn malformed_body_reports_json_path() {
		let http = FakeHttpClient::with_responses([FakeResponse::json(
			200,
			r#"{"id":"abc","viewers":"many"}"#,
		)]);
		let client =
			test_client(http, Some(FakeConnection::with_token(expiring_token("access", 3600))));

		match client.get::<Stream>("streams").await {
			Err(Error::Decode { source, .. }) => assert_eq!(source.path().to_string(), "viewers"),
			other => panic!("Unexpected result: {other:?}."),
		}
	}

	#[tokio::test]
	async fn transport_failures_are_not_retried() {
		let http = FakeHttpClient::default();
		let client =
			test_client(http.clone(), Some(FakeConnection::with_token(expiring_token("a", 3600))));
		let err = client.get::<Stream>("streams").await.expect_err("Transport is exhausted.");

		assert!(matches!(err, Error::Transport(_)));
		assert_eq!(http.requests().len(), 1);
	}

	#[test]
	fn base_address_must_be_joinable_and_secure() {
		let http = FakeHttpClient::default();
		let no_slash = ApiClient::<FakeHttpClient>::without_connection(
			Url::parse("https://api.example.com/v1").expect("URL fixture should parse."),
			http.clone(),
		);

		assert!(matches!(no_slash, Err(Error::Config(ConfigError::InvalidBaseAddress { .. }))));

		let insecure = ApiClient::<FakeHttpClient>::without_connection(
			Url::parse("http://api.example.com/v1/").expect("URL fixture should parse."),
			http,
		);

		assert!(matches!(insecure, Err(Error::Config(ConfigError::Endpoint(_)))));
	}
}
