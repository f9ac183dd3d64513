// self
use livestream_rest::{http::ReqwestHttpClient, reqwest::Client};

/// Reqwest transport that accepts the self-signed certificate served by `httpmock`.
pub fn test_http_client() -> ReqwestHttpClient {
	let client = Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");

	ReqwestHttpClient::with_client(client)
}
