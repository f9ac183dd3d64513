//! Identifiers for platforms and OAuth clients.
//!
//! A [`ClientId`] is an opaque credential issued by the platform, so only emptiness is rejected.
//! A [`PlatformId`] labels log lines and metrics and must be a single non-blank token.

// self
use crate::_prelude::*;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (platform, client).
		kind: &'static str,
	},
	/// A platform label contains whitespace.
	#[error("Platform identifier `{value}` contains whitespace.")]
	ContainsWhitespace {
		/// Rejected label.
		value: String,
	},
}

/// OAuth client identifier registered with a platform.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClientId(String);
impl ClientId {
	/// Wraps `value`, rejecting an empty string.
	pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
		let value = value.into();

		if value.is_empty() {
			return Err(IdentifierError::Empty { kind: "Client" });
		}

		Ok(Self(value))
	}

	/// Identifier as sent to the token endpoint.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl TryFrom<String> for ClientId {
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl From<ClientId> for String {
	fn from(value: ClientId) -> Self {
		value.0
	}
}
impl Debug for ClientId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Client({})", self.0)
	}
}
impl Display for ClientId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// Label for a streaming platform descriptor, e.g. `youtube` or `twitch`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlatformId(String);
impl PlatformId {
	/// Wraps `value`, rejecting empty labels and labels containing whitespace.
	pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
		let value = value.into();

		if value.is_empty() {
			return Err(IdentifierError::Empty { kind: "Platform" });
		}
		if value.chars().any(char::is_whitespace) {
			return Err(IdentifierError::ContainsWhitespace { value });
		}

		Ok(Self(value))
	}

	/// Label as rendered in diagnostics.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl TryFrom<String> for PlatformId {
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl From<PlatformId> for String {
	fn from(value: PlatformId) -> Self {
		value.0
	}
}
impl Debug for PlatformId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Platform({})", self.0)
	}
}
impl Display for PlatformId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
