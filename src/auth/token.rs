//! Immutable OAuth token snapshots with derived expiry.

pub mod secret;

// self
use crate::{
	_prelude::*,
	auth::{ClientId, token::secret::TokenSecret},
};

/// Errors produced by [`OAuthTokenBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum OAuthTokenBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no `expires_in` value was provided.
	#[error("The expires_in value is required.")]
	MissingExpiresIn,
	/// Issued when `expires_in` is negative.
	#[error("The expires_in value must not be negative.")]
	NegativeExpiresIn,
	/// Issued when `acquired_at + expires_in` falls outside the representable calendar.
	#[error("The expires_in value of {expires_in} seconds overflows the expiry instant.")]
	ExpiryOutOfRange {
		/// Rejected lifetime in seconds.
		expires_in: i64,
	},
}

/// Credential snapshot issued by a platform token endpoint.
///
/// The token never changes after construction. A refresh produces a new instance that replaces
/// this one inside the owning connection, so readers holding an `Arc<OAuthToken>` always see a
/// consistent pair of access token and expiry.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "StoredToken")]
pub struct OAuthToken {
	client_id: ClientId,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	client_secret: Option<TokenSecret>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	authorization_code: Option<String>,
	access_token: TokenSecret,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	refresh_token: Option<TokenSecret>,
	expires_in: i64,
	acquired_at: OffsetDateTime,
}
impl OAuthToken {
	/// Returns a builder for the provided OAuth client.
	pub fn builder(client_id: ClientId) -> OAuthTokenBuilder {
		OAuthTokenBuilder::new(client_id)
	}

	/// OAuth client the token was issued to.
	pub fn client_id(&self) -> &ClientId {
		&self.client_id
	}

	/// Client secret used when talking to the token endpoint.
	pub fn client_secret(&self) -> Option<&TokenSecret> {
		self.client_secret.as_ref()
	}

	/// Authorization code the token family was minted from.
	pub fn authorization_code(&self) -> Option<&str> {
		self.authorization_code.as_deref()
	}

	/// Access token attached as the bearer credential.
	pub fn access_token(&self) -> &TokenSecret {
		&self.access_token
	}

	/// Refresh token, if the platform issued one.
	pub fn refresh_token(&self) -> Option<&TokenSecret> {
		self.refresh_token.as_ref()
	}

	/// Lifetime granted by the platform, relative to [`acquired_at`](Self::acquired_at).
	pub fn expires_in(&self) -> Duration {
		Duration::seconds(self.expires_in)
	}

	/// Instant the token was constructed.
	pub fn acquired_at(&self) -> OffsetDateTime {
		self.acquired_at
	}

	/// Expiry instant, recomputed from `acquired_at + expires_in` on every call.
	pub fn expires_at(&self) -> OffsetDateTime {
		// Built tokens always have a representable expiry.
		self.acquired_at.checked_add(self.expires_in()).unwrap_or(self.acquired_at)
	}

	/// Returns `true` once `instant` reaches the expiry instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at()
	}

	/// Returns `true` if the token is expired relative to the current clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}

	/// Time left before expiry, clamped at zero.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		let remaining = self.expires_at() - instant;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}

	/// Builds the token that replaces `self` after a refresh.
	///
	/// Client credentials and the authorization code carry over. When the platform did not
	/// rotate the refresh token, the current one is kept.
	pub fn refreshed(
		&self,
		access_token: impl Into<String>,
		refresh_token: Option<String>,
		expires_in: i64,
	) -> Result<Self, OAuthTokenBuilderError> {
		let mut builder = Self::builder(self.client_id.clone())
			.access_token(access_token)
			.expires_in(expires_in);

		builder.client_secret = self.client_secret.clone();
		builder.authorization_code = self.authorization_code.clone();
		builder.refresh_token = match refresh_token {
			Some(value) => Some(TokenSecret::new(value)),
			None => self.refresh_token.clone(),
		};

		builder.build()
	}
}
impl Debug for OAuthToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthToken")
			.field("client_id", &self.client_id)
			.field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
			.field("authorization_code", &self.authorization_code.as_ref().map(|_| "<redacted>"))
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_in", &self.expires_in)
			.field("acquired_at", &self.acquired_at)
			.finish()
	}
}

/// Builder for [`OAuthToken`].
#[derive(Clone, Debug)]
pub struct OAuthTokenBuilder {
	client_id: ClientId,
	client_secret: Option<TokenSecret>,
	authorization_code: Option<String>,
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	expires_in: Option<i64>,
	acquired_at: Option<OffsetDateTime>,
}
impl OAuthTokenBuilder {
	fn new(client_id: ClientId) -> Self {
		Self {
			client_id,
			client_secret: None,
			authorization_code: None,
			access_token: None,
			refresh_token: None,
			expires_in: None,
			acquired_at: None,
		}
	}

	/// Provides the client secret.
	pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(TokenSecret::new(secret));

		self
	}

	/// Records the authorization code the token was exchanged from.
	pub fn authorization_code(mut self, code: impl Into<String>) -> Self {
		self.authorization_code = Some(code.into());

		self
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the lifetime in seconds.
	pub fn expires_in(mut self, seconds: i64) -> Self {
		self.expires_in = Some(seconds);

		self
	}

	/// Pins the acquisition instant, e.g. when restoring a persisted token.
	///
	/// Defaults to the clock reading taken by [`build`](Self::build).
	pub fn acquired_at(mut self, instant: OffsetDateTime) -> Self {
		self.acquired_at = Some(instant);

		self
	}

	/// Consumes the builder and produces an [`OAuthToken`].
	pub fn build(self) -> Result<OAuthToken, OAuthTokenBuilderError> {
		let access_token = self.access_token.ok_or(OAuthTokenBuilderError::MissingAccessToken)?;
		let expires_in = self.expires_in.ok_or(OAuthTokenBuilderError::MissingExpiresIn)?;

		if expires_in < 0 {
			return Err(OAuthTokenBuilderError::NegativeExpiresIn);
		}

		let acquired_at = self.acquired_at.unwrap_or_else(OffsetDateTime::now_utc);

		if acquired_at.checked_add(Duration::seconds(expires_in)).is_none() {
			return Err(OAuthTokenBuilderError::ExpiryOutOfRange { expires_in });
		}

		Ok(OAuthToken {
			client_id: self.client_id,
			client_secret: self.client_secret,
			authorization_code: self.authorization_code,
			access_token,
			refresh_token: self.refresh_token,
			expires_in,
			acquired_at,
		})
	}
}

/// Persisted token shape, re-validated through [`OAuthTokenBuilder`] on load.
#[derive(Deserialize)]
struct StoredToken {
	client_id: ClientId,
	#[serde(default)]
	client_secret: Option<TokenSecret>,
	#[serde(default)]
	authorization_code: Option<String>,
	access_token: TokenSecret,
	#[serde(default)]
	refresh_token: Option<TokenSecret>,
	expires_in: i64,
	acquired_at: OffsetDateTime,
}
impl TryFrom<StoredToken> for OAuthToken {
	type Error = OAuthTokenBuilderError;

	fn try_from(stored: StoredToken) -> Result<Self, Self::Error> {
		OAuthTokenBuilder {
			client_id: stored.client_id,
			client_secret: stored.client_secret,
			authorization_code: stored.authorization_code,
			access_token: Some(stored.access_token),
			refresh_token: stored.refresh_token,
			expires_in: Some(stored.expires_in),
			acquired_at: Some(stored.acquired_at),
		}
		.build()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn client() -> ClientId {
		ClientId::new("client-1").expect("Client fixture should be valid.")
	}

	#[test]
	fn expiry_boundary_counts_as_expired() {
		let acquired = macros::datetime!(2025-01-01 00:00 UTC);
		let token = OAuthToken::builder(client())
			.access_token("access")
			.expires_in(3600)
			.acquired_at(acquired)
			.build()
			.expect("Token fixture should build.");

		assert_eq!(token.expires_at(), macros::datetime!(2025-01-01 01:00 UTC));
		assert!(!token.is_expired_at(acquired + Duration::seconds(3599)));
		assert!(token.is_expired_at(acquired + Duration::seconds(3600)));
		assert_eq!(token.remaining_at(acquired + Duration::hours(2)), Duration::ZERO);
		assert_eq!(token.remaining_at(acquired + Duration::minutes(30)), Duration::minutes(30));
	}

	#[test]
	fn build_stamps_acquisition_with_current_clock() {
		let before = OffsetDateTime::now_utc();
		let token = OAuthToken::builder(client())
			.access_token("access")
			.expires_in(60)
			.build()
			.expect("Token fixture should build.");
		let after = OffsetDateTime::now_utc();

		assert!(token.acquired_at() >= before && token.acquired_at() <= after);
		assert!(!token.is_expired());
	}

	#[test]
	fn zero_lifetime_is_expired_immediately() {
		let token = OAuthToken::builder(client())
			.access_token("access")
			.expires_in(0)
			.build()
			.expect("Zero lifetime should be accepted.");

		assert!(token.is_expired());
	}

	#[test]
	fn builder_rejects_missing_fields() {
		assert_eq!(
			OAuthToken::builder(client()).expires_in(10).build().expect_err("Access is required."),
			OAuthTokenBuilderError::MissingAccessToken
		);
		assert_eq!(
			OAuthToken::builder(client()).access_token("a").build().expect_err("Expiry required."),
			OAuthTokenBuilderError::MissingExpiresIn
		);
		assert_eq!(
			OAuthToken::builder(client())
				.access_token("a")
				.expires_in(-1)
				.build()
				.expect_err("Negative expiry must be rejected."),
			OAuthTokenBuilderError::NegativeExpiresIn
		);
	}

	#[test]
	fn expiry_beyond_calendar_is_rejected() {
		let huge = 9_000_000_000_000;

		assert_eq!(
			OAuthToken::builder(client())
				.access_token("access")
				.expires_in(huge)
				.build()
				.expect_err("Unrepresentable expiry must be rejected."),
			OAuthTokenBuilderError::ExpiryOutOfRange { expires_in: huge }
		);
		assert_eq!(
			OAuthToken::builder(client())
				.access_token("access")
				.expires_in(i64::MAX)
				.build()
				.expect_err("Maximal expiry must be rejected."),
			OAuthTokenBuilderError::ExpiryOutOfRange { expires_in: i64::MAX }
		);

		let mut value = serde_json::to_value(
			OAuthToken::builder(client())
				.access_token("access")
				.expires_in(60)
				.build()
				.expect("Token fixture should build."),
		)
		.expect("Token should serialize.");

		value["expires_in"] = huge.into();

		assert!(serde_json::from_value::<OAuthToken>(value.clone()).is_err());

		value["expires_in"] = (-5).into();

		assert!(serde_json::from_value::<OAuthToken>(value).is_err());
	}

	#[test]
	fn refreshed_preserves_credentials_and_old_refresh_token() {
		let original = OAuthToken::builder(client())
			.client_secret("secret")
			.authorization_code("code-1")
			.access_token("access-old")
			.refresh_token("refresh-old")
			.expires_in(10)
			.acquired_at(macros::datetime!(2025-01-01 00:00 UTC))
			.build()
			.expect("Token fixture should build.");
		let kept = original
			.refreshed("access-new", None, 7200)
			.expect("Refreshed token should build.");

		assert_eq!(kept.access_token().expose(), "access-new");
		assert_eq!(kept.refresh_token().map(TokenSecret::expose), Some("refresh-old"));
		assert_eq!(kept.client_secret().map(TokenSecret::expose), Some("secret"));
		assert_eq!(kept.authorization_code(), Some("code-1"));
		assert_eq!(kept.expires_in(), Duration::hours(2));
		assert!(kept.acquired_at() > original.acquired_at());

		let rotated = original
			.refreshed("access-new", Some("refresh-new".into()), 7200)
			.expect("Rotated token should build.");

		assert_eq!(rotated.refresh_token().map(TokenSecret::expose), Some("refresh-new"));
	}

	#[test]
	fn debug_output_redacts_secrets() {
		let token = OAuthToken::builder(client())
			.client_secret("top-secret")
			.access_token("access-secret")
			.refresh_token("refresh-secret")
			.expires_in(10)
			.build()
			.expect("Token fixture should build.");
		let rendered = format!("{token:?}");

		assert!(!rendered.contains("top-secret"));
		assert!(!rendered.contains("access-secret"));
		assert!(!rendered.contains("refresh-secret"));
	}

	#[test]
	fn serde_uses_oauth_wire_names() {
		let token = OAuthToken::builder(client())
			.access_token("access")
			.refresh_token("refresh")
			.expires_in(3600)
			.build()
			.expect("Token fixture should build.");
		let value = serde_json::to_value(&token).expect("Token should serialize.");

		assert_eq!(value["access_token"], "access");
		assert_eq!(value["refresh_token"], "refresh");
		assert_eq!(value["expires_in"], 3600);
		assert!(value.get("client_secret").is_none());

		let restored: OAuthToken = serde_json::from_value(value).expect("Token should deserialize.");

		assert_eq!(restored.acquired_at(), token.acquired_at());
		assert_eq!(restored.expires_at(), token.expires_at());
	}
}
