//! The authenticated client: token caching plus the generic fetch helper every REST operation
//! delegates to.

// crates.io
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, TokenCache},
	config::ClientConfig,
	error::ConfigError,
	http::{FetchRequest, FetchResponse, ReqwestHttpClient},
	oauth,
	obs::{self, OperationKind},
};

/// Salesforce REST client bound to one org and one integration user.
///
/// Clones are cheap and share the token cache, so a single password grant serves every clone.
/// The token is requested lazily on first use, reused until it enters the configured refresh
/// window, and dropped when the API answers `401`. Requests are never retried.
#[derive(Clone)]
pub struct SalesforceClient {
	http_client: ReqwestHttpClient,
	config: Arc<ClientConfig>,
	cache: Arc<TokenCache>,
}
impl SalesforceClient {
	/// Creates a client with a default reqwest transport.
	pub fn new(config: ClientConfig) -> Self {
		Self::with_http_client(config, ReqwestHttpClient::default())
	}

	/// Creates a client that reuses the caller-provided transport.
	pub fn with_http_client(config: ClientConfig, http_client: ReqwestHttpClient) -> Self {
		Self { http_client, config: Arc::new(config), cache: Default::default() }
	}

	/// Returns the configuration the client was built with.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Returns the cached token, or performs the password grant when none is usable.
	///
	/// Concurrent callers share a single in-flight grant.
	pub async fn access_token(&self) -> Result<AccessToken> {
		let window = self.config.refresh_window;

		if let Some(token) = self.cache.current(OffsetDateTime::now_utc(), window) {
			return Ok(token);
		}

		let _singleflight = self.cache.guard().await;

		if let Some(token) = self.cache.current(OffsetDateTime::now_utc(), window) {
			return Ok(token);
		}

		let token = obs::observe(
			OperationKind::Token,
			"password_grant",
			oauth::exchange_password(&self.config, &self.http_client),
		)
		.await?;

		self.cache.store(token.clone());

		Ok(token)
	}

	/// Returns the cached token without contacting the token endpoint.
	pub fn cached_token(&self) -> Option<AccessToken> {
		self.cache.peek()
	}

	/// Drops the cached token so the next request performs a fresh grant.
	pub fn invalidate_token(&self) {
		if self.cache.clear().is_some() {
			obs::record_token_invalidated("requested");
		}
	}

	/// Sends an authenticated request relative to the versioned API base.
	///
	/// Every HTTP status is returned as a [`FetchResponse`]; only token, configuration, and
	/// transport failures surface as errors.
	pub async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
		obs::observe(OperationKind::Fetch, "fetch", self.send(request)).await
	}

	pub(crate) async fn send(&self, request: FetchRequest) -> Result<FetchResponse> {
		if !request.path.starts_with('/') {
			return Err(ConfigError::InvalidPathSegment {
				kind: "request path",
				segment: request.path,
			}
			.into());
		}

		let url = self.config.endpoint(&request.path, &request.query)?;
		let token = self.access_token().await?;
		let mut builder = self
			.http_client
			.request(request.method.clone(), url)
			.header(AUTHORIZATION, token.bearer())
			.header(ACCEPT, "application/json");

		if let Some(body) = request.body {
			builder = builder.header(CONTENT_TYPE, "application/json").body(body);
		}

		let response = builder.send().await.map_err(oauth::map_reqwest_error)?;
		let status = response.status().as_u16();
		let body = response.bytes().await.map_err(oauth::map_reqwest_error)?.to_vec();

		obs::record_status(&request.method, &request.path, status);

		if status == StatusCode::UNAUTHORIZED.as_u16()
			&& self.cache.clear_if_matches(token.access_token.expose())
		{
			obs::record_token_invalidated("unauthorized");
		}

		Ok(FetchResponse { status, body })
	}
}
impl Debug for SalesforceClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SalesforceClient")
			.field("org_url", &self.config.org_url.as_str())
			.field("api_version", &self.config.api_version)
			.field("client_id", &self.config.client_id)
			.field("token_cached", &self.cache.peek().is_some())
			.finish()
	}
}

/// Validates a value that will be placed in a single resource path segment.
pub(crate) fn path_segment<'a>(kind: &'static str, value: &'a str) -> Result<&'a str> {
	if value.is_empty()
		|| value.trim() != value
		|| value.contains(['/', '?', '#', '\\'])
		|| value == "."
		|| value == ".."
	{
		return Err(ConfigError::InvalidPathSegment { kind, segment: value.to_owned() }.into());
	}

	Ok(value)
}
