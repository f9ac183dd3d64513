//! Shared OAuth-authenticated REST core for live-streaming platform clients: token lifecycle,
//! authenticated request execution, cursor pagination, and error normalization in one crate.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod connection;
pub mod error;
pub mod http;
pub mod logger;
pub mod obs;
pub mod pagination;
pub mod platform;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for tests; enabled via `cfg(test)` or the `test` crate
	//! feature.

	pub use crate::_prelude::*;

	// std
	use std::collections::VecDeque;
	// crates.io
	use oauth2::{
		AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
		http::{
			StatusCode,
			header::{AUTHORIZATION, CONTENT_TYPE, HeaderName},
		},
	};
	// self
	use crate::{
		auth::{ClientId, OAuthToken},
		client::ApiClient,
		connection::{Connection, ConnectionFuture},
		error::TokenEndpointError,
		http::HttpClient,
		logger::Logger,
	};

	/// Base address used by [`test_client`].
	pub const TEST_BASE_ADDRESS: &str = "https://api.example.com/v1/";

	/// Token for client `client` with refresh token `refresh`, expiring `expires_in` seconds from
	/// now.
	pub fn expiring_token(access_token: &str, expires_in: i64) -> OAuthToken {
		OAuthToken::builder(ClientId::new("client").expect("Client fixture should be valid."))
			.client_secret("secret")
			.access_token(access_token)
			.refresh_token("refresh")
			.expires_in(expires_in)
			.build()
			.expect("Token fixture should build.")
	}

	/// Builds an [`ApiClient`] rooted at [`TEST_BASE_ADDRESS`] with a private logger.
	pub fn test_client(
		http_client: FakeHttpClient,
		connection: Option<FakeConnection>,
	) -> ApiClient<FakeHttpClient> {
		let base = Url::parse(TEST_BASE_ADDRESS).expect("Test base address should parse.");
		let client: Result<ApiClient<FakeHttpClient>> = match connection {
			Some(connection) => ApiClient::new(base, Arc::new(connection), http_client),
			None => ApiClient::without_connection(base, http_client),
		};

		client.expect("Test client should build.").with_logger(Arc::new(Logger::new()))
	}

	/// Canned response served by [`FakeHttpClient`].
	#[derive(Clone, Debug)]
	pub struct FakeResponse {
		status: StatusCode,
		body: Vec<u8>,
	}
	impl FakeResponse {
		/// Response with the given status and body text.
		pub fn json(status: u16, body: impl Into<String>) -> Self {
			Self {
				status: StatusCode::from_u16(status).expect("Status fixture should be valid."),
				body: body.into().into_bytes(),
			}
		}
	}

	/// Request observed by [`FakeHttpClient`].
	#[derive(Clone, Debug, PartialEq, Eq)]
	pub struct RecordedRequest {
		/// HTTP method.
		pub method: String,
		/// Full request URL.
		pub url: String,
		/// `Authorization` header, if sent.
		pub authorization: Option<String>,
		/// `Content-Type` header, if sent.
		pub content_type: Option<String>,
		/// Raw request body.
		pub body: Vec<u8>,
	}

	#[derive(Debug, Default)]
	struct FakeTransport {
		responses: VecDeque<FakeResponse>,
		requests: Vec<RecordedRequest>,
	}

	/// In-memory transport serving queued responses in order.
	///
	/// Once the queue is exhausted every call fails with an I/O error.
	#[derive(Clone, Debug, Default)]
	pub struct FakeHttpClient(Arc<Mutex<FakeTransport>>);
	impl FakeHttpClient {
		/// Queues `responses`.
		pub fn with_responses(responses: impl IntoIterator<Item = FakeResponse>) -> Self {
			let client = Self::default();

			client.0.lock().responses.extend(responses);

			client
		}

		/// Requests observed so far.
		pub fn requests(&self) -> Vec<RecordedRequest> {
			self.0.lock().requests.clone()
		}
	}
	impl HttpClient for FakeHttpClient {
		type Handle = FakeHttpClient;
		type TransportError = std::io::Error;

		fn handle(&self) -> Self::Handle {
			self.clone()
		}
	}
	impl<'c> AsyncHttpClient<'c> for FakeHttpClient {
		type Error = HttpClientError<std::io::Error>;
		type Future =
			Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

		fn call(&'c self, request: HttpRequest) -> Self::Future {
			let header = |name: HeaderName| {
				request.headers().get(name).and_then(|value| value.to_str().ok()).map(str::to_owned)
			};
			let recorded = RecordedRequest {
				method: request.method().to_string(),
				url: request.uri().to_string(),
				authorization: header(AUTHORIZATION),
				content_type: header(CONTENT_TYPE),
				body: request.body().clone(),
			};
			let mut transport = self.0.lock();

			transport.requests.push(recorded);

			let result = match transport.responses.pop_front() {
				Some(canned) => {
					let mut response = HttpResponse::new(canned.body);

					*response.status_mut() = canned.status;

					Ok(response)
				},
				None => Err(HttpClientError::Io(std::io::Error::other("no canned response left"))),
			};

			Box::pin(async move { result })
		}
	}

	#[derive(Debug, Default)]
	struct FakeSession {
		token: Option<Arc<OAuthToken>>,
		replacement: Option<OAuthToken>,
		refreshes: usize,
	}

	/// [`Connection`] whose refresh installs a preconfigured replacement token.
	///
	/// Refreshing without a replacement fails with [`TokenEndpointError::MissingRefreshToken`].
	#[derive(Clone, Debug, Default)]
	pub struct FakeConnection(Arc<Mutex<FakeSession>>);
	impl FakeConnection {
		/// Connection with no token.
		pub fn empty() -> Self {
			Self::default()
		}

		/// Connection holding `token`.
		pub fn with_token(token: OAuthToken) -> Self {
			let connection = Self::default();

			connection.0.lock().token = Some(Arc::new(token));

			connection
		}

		/// Sets the token installed by the next refresh.
		pub fn refreshing_to(self, token: OAuthToken) -> Self {
			self.0.lock().replacement = Some(token);

			self
		}

		/// Number of refreshes attempted.
		pub fn refresh_count(&self) -> usize {
			self.0.lock().refreshes
		}
	}
	impl Connection for FakeConnection {
		fn token(&self) -> Option<Arc<OAuthToken>> {
			self.0.lock().token.clone()
		}

		fn refresh(&self) -> ConnectionFuture<'_, Arc<OAuthToken>> {
			let mut session = self.0.lock();

			session.refreshes += 1;

			let result = session
				.replacement
				.take()
				.map(Arc::new)
				.ok_or(TokenEndpointError::MissingRefreshToken)
				.inspect(|token| session.token = Some(token.clone()));

			Box::pin(async move { result })
		}
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	#[cfg(any(test, feature = "test"))] pub use parking_lot::Mutex;
	pub use parking_lot::RwLock;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
