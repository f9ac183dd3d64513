//! Error taxonomy shared by the executor, the paginated fetcher, and connections.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error surfaced by authenticated requests.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Transport failure (DNS, connect, TLS, timeout); never retried internally.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Non-success HTTP response.
	#[error(transparent)]
	Request(#[from] RequestError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Successful response whose body did not match the requested shape.
	#[error("Response body from {url} could not be decoded.")]
	Decode {
		/// URL that produced the body.
		url: String,
		/// Structured parsing failure, including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},

	/// The connection has no token configured.
	#[error("No OAuth token is configured for this connection.")]
	AuthenticationMissing,
	/// The token was expired and refreshing it failed.
	#[error("OAuth token expired and could not be refreshed.")]
	AuthenticationExpired {
		/// Token endpoint failure that prevented the refresh.
		#[source]
		source: TokenEndpointError,
	},
}
impl Error {
	/// Returns `true` for failures that require the caller to re-authenticate.
	pub fn is_authentication(&self) -> bool {
		matches!(self, Self::AuthenticationMissing | Self::AuthenticationExpired { .. })
	}

	/// Diagnostic text for log sinks; HTTP failures include the URL and raw body.
	pub fn describe(&self) -> String {
		match self {
			Self::Request(e) => e.describe(),
			_ => self.to_string(),
		}
	}

	/// Returns the failed response snapshot, if this is an HTTP-level failure.
	pub fn as_request(&self) -> Option<&RequestError> {
		match self {
			Self::Request(e) => Some(e),
			_ => None,
		}
	}
}

/// Immutable snapshot of a non-success HTTP response.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("{method} {url} failed with {status} {reason}.")]
pub struct RequestError {
	/// HTTP method of the failed request.
	pub method: String,
	/// Fully-resolved target URL.
	pub url: String,
	/// HTTP status code.
	pub status: u16,
	/// Canonical reason phrase of `status`, empty when none is registered.
	///
	/// HTTP/2 responses carry no reason phrase on the wire, so the phrase is derived from the
	/// status code rather than echoed from the server.
	pub reason: String,
	/// Response body as text; bytes that are not valid UTF-8 are replaced with U+FFFD.
	pub body: String,
	/// Response body exactly as received.
	pub raw_body: Vec<u8>,
}
impl RequestError {
	/// Snapshots a failed response, keeping the body bytes untouched in
	/// [`raw_body`](Self::raw_body).
	pub fn new(
		method: impl Into<String>,
		url: impl Into<String>,
		status: u16,
		reason: impl Into<String>,
		raw_body: Vec<u8>,
	) -> Self {
		Self {
			method: method.into(),
			url: url.into(),
			status,
			reason: reason.into(),
			body: String::from_utf8_lossy(&raw_body).into_owned(),
			raw_body,
		}
	}

	/// Multi-line description carrying the URL and body, suited for log sinks.
	pub fn describe(&self) -> String {
		format!("{self}\n{}\n{}", self.url, self.body)
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// An endpoint failed scheme validation.
	#[error(transparent)]
	Endpoint(#[from] crate::platform::PlatformDescriptorError),
	/// The service base address cannot be joined with relative paths.
	#[error("Base address `{url}` cannot be used as a base; it must be absolute and end with `/`.")]
	InvalidBaseAddress {
		/// Rejected base address.
		url: String,
	},
	/// A request path could not be resolved against the base address.
	#[error("Request path `{path}` is invalid.")]
	InvalidPath {
		/// Rejected path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Request body could not be serialized to JSON.
	#[error("Request body could not be encoded as JSON.")]
	EncodeBody(#[source] serde_json::Error),
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {target}.")]
	Network {
		/// Endpoint label or URL.
		target: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
	/// The transport could not translate the request.
	#[error("HTTP request could not be translated by the transport.")]
	InvalidRequest(#[source] oauth2::http::Error),
	/// Transport failure reported only as a message.
	#[error("HTTP client error: {message}.")]
	Other {
		/// Message supplied by the transport.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		target: impl Into<String>,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { target: target.into(), source: Box::new(src) }
	}
}

/// Failures raised while talking to a platform token endpoint.
#[derive(Debug, ThisError)]
pub enum TokenEndpointError {
	/// The platform rejected the grant with an OAuth error payload.
	#[error("Token endpoint rejected the {grant} grant: {error}.")]
	Rejected {
		/// Grant label.
		grant: &'static str,
		/// OAuth `error` code.
		error: String,
		/// Optional `error_description`.
		description: Option<String>,
	},
	/// The current token carries no refresh token.
	#[error("Token has no refresh token.")]
	MissingRefreshToken,
	/// No token is configured, so there is nothing to refresh.
	#[error("No token is configured for refresh.")]
	MissingToken,
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned an `expires_in` outside the supported range.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint responded with malformed JSON.
	#[error("Token endpoint returned malformed JSON.")]
	Parse(#[source] serde_path_to_error::Error<serde_json::Error>),
	/// Token endpoint could not be reached.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Token request could not be built.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Replacement token could not be assembled.
	#[error(transparent)]
	TokenBuild(#[from] crate::auth::OAuthTokenBuilderError),
	/// Any other token endpoint failure.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	Unexpected {
		/// Description of the failure.
		message: String,
	},
	/// Failure of a token endpoint round trip, handed to every caller that waited on it.
	#[error(transparent)]
	Shared(Arc<TokenEndpointError>),
}
impl TokenEndpointError {
	/// Returns the underlying failure, looking through [`Shared`](Self::Shared).
	pub fn root(&self) -> &Self {
		match self {
			Self::Shared(inner) => inner.root(),
			_ => self,
		}
	}
}
