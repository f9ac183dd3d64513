// self
use crate::{
	_prelude::*,
	auth::PlatformId,
	platform::{ClientAuthMethod, PlatformDescriptor},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum PlatformDescriptorError {
	/// Token endpoint is mandatory.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// Endpoints must use HTTPS unless they point at a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
}

/// Builder for [`PlatformDescriptor`] values.
#[derive(Debug)]
pub struct PlatformDescriptorBuilder {
	/// Identifier for the descriptor being constructed.
	pub id: PlatformId,
	/// Token endpoint used for exchanges and refreshes.
	pub token_endpoint: Option<Url>,
	/// Client authentication method for the token endpoint.
	pub client_auth_method: ClientAuthMethod,
}
impl PlatformDescriptorBuilder {
	/// Creates a new builder seeded with the provided identifier.
	pub fn new(id: PlatformId) -> Self {
		Self { id, token_endpoint: None, client_auth_method: ClientAuthMethod::default() }
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Overrides the client authentication method.
	pub fn client_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.client_auth_method = method;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<PlatformDescriptor, PlatformDescriptorError> {
		let token_endpoint =
			self.token_endpoint.ok_or(PlatformDescriptorError::MissingTokenEndpoint)?;

		validate_endpoint("token", &token_endpoint)?;

		Ok(PlatformDescriptor {
			id: self.id,
			token_endpoint,
			client_auth_method: self.client_auth_method,
		})
	}
}

/// Accepts HTTPS endpoints, and plain HTTP only for loopback hosts.
pub(crate) fn validate_endpoint(
	name: &'static str,
	url: &Url,
) -> Result<(), PlatformDescriptorError> {
	let loopback = match url.host() {
		Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
		Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	};

	if url.scheme() == "https" || (url.scheme() == "http" && loopback) {
		Ok(())
	} else {
		Err(PlatformDescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	}
}
