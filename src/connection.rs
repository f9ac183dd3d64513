//! Token ownership and refresh for one authenticated platform session.
//!
//! [`Connection`] is the contract the request executor consumes: it hands out the current
//! [`OAuthToken`] and replaces it through a refresh. [`OAuthConnection`] implements it against a
//! platform token endpoint using the `oauth2` crate, and serializes refreshes so that callers
//! observing the same expired token share one `grant_type=refresh_token` round trip.

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AuthType, AuthorizationCode, ClientId as OAuthClientId, ClientSecret, EndpointNotSet,
	EndpointSet, HttpClientError, RedirectUrl, RefreshToken, RequestTokenError, TokenResponse,
	TokenUrl,
	basic::{BasicClient, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::{ClientId, OAuthToken, TokenSecret},
	error::TokenEndpointError,
	http::{self, HttpClient},
	logger::{LogLevel, Logger},
	obs::{self, OpKind, OpOutcome, OpSpan},
	platform::{ClientAuthMethod, PlatformDescriptor},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Boxed future returned by [`Connection`] operations.
pub type ConnectionFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, TokenEndpointError>> + 'a + Send>>;

/// Source of OAuth tokens shared by every service of one platform session.
pub trait Connection
where
	Self: Send + Sync,
{
	/// Returns the current token snapshot, if one is configured.
	fn token(&self) -> Option<Arc<OAuthToken>>;

	/// Replaces the current token with a refreshed one and returns it.
	///
	/// Implementations may return a token produced by a refresh that completed while this call
	/// was waiting, instead of issuing a second refresh.
	fn refresh(&self) -> ConnectionFuture<'_, Arc<OAuthToken>>;

	/// Returns the current token, refreshing it first when it is expired and `auto_refresh` is
	/// set. An expired token is returned as-is when `auto_refresh` is `false`.
	fn get_token(&self, auto_refresh: bool) -> ConnectionFuture<'_, Option<Arc<OAuthToken>>> {
		Box::pin(async move {
			let Some(token) = self.token() else {
				return Ok(None);
			};

			if auto_refresh && token.is_expired() {
				return self.refresh().await.map(Some);
			}

			Ok(Some(token))
		})
	}
}

#[derive(Clone, Copy, Debug)]
enum RefreshMode {
	IfExpired,
	Force,
}
impl RefreshMode {
	const fn stage(self) -> &'static str {
		match self {
			Self::IfExpired => "refresh",
			Self::Force => "force_refresh",
		}
	}
}

#[derive(Debug, Default)]
struct TokenSlot {
	token: Option<Arc<OAuthToken>>,
	// Bumped on every install or clear.
	generation: u64,
	// Bumped on every failed token endpoint round trip.
	failures: u64,
	last_failure: Option<Arc<TokenEndpointError>>,
}

#[derive(Clone, Copy, Debug)]
struct Observed {
	generation: u64,
	failures: u64,
}

/// [`Connection`] backed by a platform token endpoint.
pub struct OAuthConnection<C>
where
	C: HttpClient,
{
	descriptor: PlatformDescriptor,
	http_client: Arc<C>,
	logger: Arc<Logger>,
	slot: RwLock<TokenSlot>,
	refresh_guard: AsyncMutex<()>,
}
impl<C> OAuthConnection<C>
where
	C: HttpClient,
{
	/// Creates a connection that reuses the caller-provided transport.
	pub fn with_http_client(descriptor: PlatformDescriptor, http_client: impl Into<Arc<C>>) -> Self {
		Self {
			descriptor,
			http_client: http_client.into(),
			logger: Logger::global(),
			slot: Default::default(),
			refresh_guard: AsyncMutex::new(()),
		}
	}

	/// Seeds the connection with an existing token (e.g. one restored by the caller).
	pub fn with_token(self, token: OAuthToken) -> Self {
		self.set_token(token);

		self
	}

	/// Routes diagnostics to `logger` instead of [`Logger::global`].
	pub fn with_logger(mut self, logger: Arc<Logger>) -> Self {
		self.logger = logger;

		self
	}

	/// Platform descriptor driving this connection.
	pub fn descriptor(&self) -> &PlatformDescriptor {
		&self.descriptor
	}

	/// Transport shared with clients built on this connection.
	pub fn http_client(&self) -> Arc<C> {
		self.http_client.clone()
	}

	/// Replaces the current token.
	pub fn set_token(&self, token: OAuthToken) -> Arc<OAuthToken> {
		self.install(token)
	}

	/// Removes the current token; later requests fail with `AuthenticationMissing`.
	pub fn clear_token(&self) -> Option<Arc<OAuthToken>> {
		let mut slot = self.slot.write();

		slot.generation += 1;

		slot.token.take()
	}

	/// Exchanges an authorization code for a token and installs it.
	pub async fn exchange_code(
		&self,
		client_id: ClientId,
		client_secret: Option<&str>,
		code: &str,
		redirect_uri: Option<&Url>,
	) -> Result<Arc<OAuthToken>, TokenEndpointError> {
		const KIND: OpKind = OpKind::ExchangeCode;

		let span = OpSpan::new(KIND, "exchange_code");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async move {
				let secret = client_secret.map(TokenSecret::new);
				let oauth_client = self.oauth_client(&client_id, secret.as_ref());
				let handle = self.http_client.handle();
				let mut request =
					oauth_client.exchange_code(AuthorizationCode::new(code.to_owned()));

				if let Some(redirect) = redirect_uri {
					request = request
						.set_redirect_uri(Cow::Owned(RedirectUrl::from_url(redirect.clone())));
				}

				let response = request
					.request_async(&handle)
					.await
					.map_err(|err| self.map_request_error("authorization_code", err))?;
				let mut builder = OAuthToken::builder(client_id)
					.authorization_code(code)
					.access_token(response.access_token().secret().to_owned())
					.expires_in(expires_in_seconds(&response)?);

				if let Some(secret) = client_secret {
					builder = builder.client_secret(secret);
				}
				if let Some(refresh) = response.refresh_token() {
					builder = builder.refresh_token(refresh.secret().to_owned());
				}

				Ok(self.install(builder.build()?))
			})
			.await;

		obs::record_op_outcome(KIND, OpOutcome::of(&result));

		if let Err(err) = &result {
			self.logger.log(
				LogLevel::Error,
				format!("{}: authorization code exchange failed: {err}", self.descriptor.id),
			);
		}

		result
	}

	/// Refreshes the token even when it has not expired yet.
	///
	/// Concurrent callers still share one token endpoint round trip.
	pub async fn force_refresh(&self) -> Result<Arc<OAuthToken>, TokenEndpointError> {
		self.refresh_with(RefreshMode::Force).await
	}

	async fn refresh_with(&self, mode: RefreshMode) -> Result<Arc<OAuthToken>, TokenEndpointError> {
		const KIND: OpKind = OpKind::Refresh;

		let span = OpSpan::new(KIND, mode.stage());

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async move {
				let observed = self.observe();
				let _singleflight = self.refresh_guard.lock().await;

				if let Some(outcome) = self.settled_since(observed) {
					self.logger.log(
						LogLevel::Debug,
						format!("{}: reusing outcome of concurrent refresh", self.descriptor.id),
					);

					return outcome;
				}

				let current = self.token().ok_or(TokenEndpointError::MissingToken)?;

				if matches!(mode, RefreshMode::IfExpired) && !current.is_expired() {
					return Ok(current);
				}

				let refresh_secret =
					current.refresh_token().ok_or(TokenEndpointError::MissingRefreshToken)?;

				self.logger.info(format!("{}: refreshing OAuth token", self.descriptor.id));

				match self.request_refresh(&current, refresh_secret).await {
					Ok(refreshed) => Ok(self.install(refreshed)),
					Err(err) => Err(self.record_failure(err)),
				}
			})
			.await;

		obs::record_op_outcome(KIND, OpOutcome::of(&result));

		if let Err(err) = &result {
			self.logger
				.log(LogLevel::Error, format!("{}: token refresh failed: {err}", self.descriptor.id));
		}

		result
	}

	async fn request_refresh(
		&self,
		current: &OAuthToken,
		refresh_secret: &TokenSecret,
	) -> Result<OAuthToken, TokenEndpointError> {
		let oauth_client = self.oauth_client(current.client_id(), current.client_secret());
		let handle = self.http_client.handle();
		let refresh_token = RefreshToken::new(refresh_secret.expose().to_owned());
		let response = oauth_client
			.exchange_refresh_token(&refresh_token)
			.request_async(&handle)
			.await
			.map_err(|err| self.map_request_error("refresh_token", err))?;

		Ok(current.refreshed(
			response.access_token().secret().to_owned(),
			response.refresh_token().map(|token| token.secret().to_owned()),
			expires_in_seconds(&response)?,
		)?)
	}

	fn observe(&self) -> Observed {
		let slot = self.slot.read();

		Observed { generation: slot.generation, failures: slot.failures }
	}

	/// Returns the outcome another caller produced after `observed`: the installed token, or the
	/// failure of the round trip that completed while this caller waited.
	fn settled_since(
		&self,
		observed: Observed,
	) -> Option<Result<Arc<OAuthToken>, TokenEndpointError>> {
		let slot = self.slot.read();

		if slot.generation != observed.generation {
			return slot.token.clone().map(Ok);
		}
		if slot.failures != observed.failures {
			return slot.last_failure.clone().map(|err| Err(TokenEndpointError::Shared(err)));
		}

		None
	}

	fn record_failure(&self, err: TokenEndpointError) -> TokenEndpointError {
		let err = Arc::new(err);
		let mut slot = self.slot.write();

		slot.failures += 1;
		slot.last_failure = Some(err.clone());

		TokenEndpointError::Shared(err)
	}

	fn install(&self, token: OAuthToken) -> Arc<OAuthToken> {
		let token = Arc::new(token);
		let mut slot = self.slot.write();

		slot.generation += 1;
		slot.token = Some(token.clone());
		slot.last_failure = None;

		token
	}

	fn oauth_client(
		&self,
		client_id: &ClientId,
		client_secret: Option<&TokenSecret>,
	) -> ConfiguredBasicClient {
		let mut oauth_client = BasicClient::new(OAuthClientId::new(client_id.to_string()))
			.set_token_uri(TokenUrl::from_url(self.descriptor.token_endpoint.clone()));

		if let Some(secret) = client_secret {
			oauth_client = oauth_client.set_client_secret(ClientSecret::new(secret.expose().into()));
		}
		if matches!(self.descriptor.client_auth_method, ClientAuthMethod::ClientSecretPost) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		oauth_client
	}

	fn map_request_error(
		&self,
		grant: &'static str,
		err: BasicRequestTokenError<HttpClientError<C::TransportError>>,
	) -> TokenEndpointError {
		match err {
			RequestTokenError::ServerResponse(response) => TokenEndpointError::Rejected {
				grant,
				error: response.error().as_ref().to_string(),
				description: response.error_description().cloned(),
			},
			RequestTokenError::Request(error) =>
				http::map_http_client_error(self.descriptor.token_endpoint.as_str(), error).into(),
			RequestTokenError::Parse(error, _body) => TokenEndpointError::Parse(error),
			RequestTokenError::Other(message) => TokenEndpointError::Unexpected { message },
		}
	}
}
#[cfg(feature = "reqwest")]
impl OAuthConnection<ReqwestHttpClient> {
	/// Creates a connection that provisions its own reqwest-backed transport.
	pub fn new(descriptor: PlatformDescriptor) -> Self {
		Self::with_http_client(descriptor, ReqwestHttpClient::default())
	}
}
impl<C> Connection for OAuthConnection<C>
where
	C: HttpClient,
{
	fn token(&self) -> Option<Arc<OAuthToken>> {
		self.slot.read().token.clone()
	}

	fn refresh(&self) -> ConnectionFuture<'_, Arc<OAuthToken>> {
		Box::pin(self.refresh_with(RefreshMode::IfExpired))
	}
}
impl<C> Debug for OAuthConnection<C>
where
	C: HttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let slot = self.slot.read();

		f.debug_struct("OAuthConnection")
			.field("descriptor", &self.descriptor)
			.field("token", &slot.token)
			.field("generation", &slot.generation)
			.field("failures", &slot.failures)
			.finish()
	}
}

fn expires_in_seconds(response: &BasicTokenResponse) -> Result<i64, TokenEndpointError> {
	let expires_in = response.expires_in().ok_or(TokenEndpointError::MissingExpiresIn)?;

	i64::try_from(expires_in.as_secs()).map_err(|_| TokenEndpointError::ExpiresInOutOfRange)
}
