//! Platform descriptors: the token endpoint and client authentication of one streaming service.
//!
//! Descriptors are validated data. API base addresses are not part of a descriptor because a
//! platform may expose several API generations; each [`ApiClient`](crate::client::ApiClient)
//! carries its own base address instead.

/// Builder API for assembling platform descriptors.
pub mod builder;

pub use builder::*;

// self
use crate::{_prelude::*, auth::PlatformId};

/// How client credentials are presented to the token endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
}

/// Immutable platform descriptor consumed by connections.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformDescriptor {
	/// Descriptor identifier, used in log messages.
	pub id: PlatformId,
	/// Token endpoint used for code exchanges and refreshes.
	pub token_endpoint: Url,
	/// Client authentication mechanism for the token endpoint.
	pub client_auth_method: ClientAuthMethod,
}
impl PlatformDescriptor {
	/// Creates a new builder for the provided identifier.
	pub fn builder(id: PlatformId) -> PlatformDescriptorBuilder {
		PlatformDescriptorBuilder::new(id)
	}
}
