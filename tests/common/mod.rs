//! Shared fixtures for the httpmock-driven integration tests.

#![allow(dead_code)]

// crates.io
use httpmock::prelude::*;
use salesforce_rest::{
	ClientConfig, SalesforceClient, http::ReqwestHttpClient, reqwest::Client as ReqwestClient,
};

pub const ACCESS_TOKEN: &str = "00Dxx0000001gPL!AR8AQJXgFake";
pub const BEARER: &str = "Bearer 00Dxx0000001gPL!AR8AQJXgFake";
pub const TOKEN_PATH: &str = "/services/oauth2/token";
pub const API: &str = "/services/data/v61.0";
pub const CLIENT_ID: &str = "test-consumer-key";
pub const CLIENT_SECRET: &str = "test-consumer-secret";
pub const USERNAME: &str = "integration@acme.test";
pub const PASSWORD: &str = "hunter2TOKEN";

/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
/// `httpmock` during tests.
pub fn test_reqwest_http_client() -> ReqwestHttpClient {
	let client = ReqwestClient::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");

	ReqwestHttpClient::with_client(client)
}

pub fn test_config(server: &MockServer) -> ClientConfig {
	ClientConfig::builder(server.base_url())
		.client_id(CLIENT_ID)
		.client_secret(CLIENT_SECRET)
		.username(USERNAME)
		.password(PASSWORD)
		.build()
		.expect("Test configuration should build.")
}

pub fn build_client(server: &MockServer) -> SalesforceClient {
	SalesforceClient::with_http_client(test_config(server), test_reqwest_http_client())
}

pub fn api(path: &str) -> String {
	format!("{API}{path}")
}

/// Mocks a successful password grant returning [`ACCESS_TOKEN`].
pub async fn mock_token(server: &MockServer) -> httpmock::Mock<'_> {
	let body = format!(
		"{{\"access_token\":\"{ACCESS_TOKEN}\",\"instance_url\":\"{}\",\"id\":\"https://login.salesforce.com/id/00Dxx0000001gPL/005xx000001Sv6e\",\"token_type\":\"Bearer\",\"signature\":\"c2lnbmF0dXJl\"}}",
		server.base_url()
	);

	server
		.mock_async(|when, then| {
			when.method(POST)
				.path(TOKEN_PATH)
				.form_urlencoded_tuple("grant_type", "password")
				.form_urlencoded_tuple("client_id", CLIENT_ID)
				.form_urlencoded_tuple("client_secret", CLIENT_SECRET)
				.form_urlencoded_tuple("username", USERNAME)
				.form_urlencoded_tuple("password", PASSWORD);
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await
}
