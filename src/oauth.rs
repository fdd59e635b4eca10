//! Resource-owner password grant against the org's OAuth token endpoint.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, ExtraTokenFields,
	HttpClientError, RequestTokenError, ResourceOwnerPassword, ResourceOwnerUsername,
	StandardRevocableToken, StandardTokenResponse, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRequestTokenError, BasicRevocationErrorResponse,
		BasicTokenIntrospectionResponse, BasicTokenType,
	},
};
// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	config::ClientConfig,
	error::{ConfigError, TransientError, TransportError},
	http::{ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot},
};

/// Salesforce-specific fields returned next to the standard token response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesforceTokenFields {
	/// Instance the org wants API traffic sent to.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub instance_url: Option<String>,
	/// Identity URL of the authenticated user.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	/// Issue instant in Unix epoch milliseconds, encoded as a string.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub issued_at: Option<String>,
	/// HMAC signature over `id` and `issued_at`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub signature: Option<String>,
}
impl ExtraTokenFields for SalesforceTokenFields {}

/// Token response decoded from the password grant.
pub type SalesforceTokenResponse = StandardTokenResponse<SalesforceTokenFields, BasicTokenType>;

type UnconfiguredClient = oauth2::Client<
	BasicErrorResponse,
	SalesforceTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
>;
type PasswordClient = oauth2::Client<
	BasicErrorResponse,
	SalesforceTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;

/// Classification applied to OAuth error responses from the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenErrorKind {
	/// Username/password rejected, or the user is locked out.
	InvalidGrant,
	/// Consumer key/secret rejected.
	InvalidClient,
	/// Anything else; the caller may try again later.
	Transient,
}

/// Performs the password grant and converts the response into an [`AccessToken`].
pub(crate) async fn exchange_password(
	config: &ClientConfig,
	http_client: &ReqwestHttpClient,
) -> Result<AccessToken> {
	let token_url = TokenUrl::new(config.token_url()?.to_string())
		.map_err(|source| ConfigError::InvalidEndpoint { source })?;
	let oauth_client: PasswordClient =
		UnconfiguredClient::new(ClientId::new(config.client_id.clone()))
			.set_client_secret(ClientSecret::new(config.client_secret.expose().to_owned()))
			.set_auth_type(AuthType::RequestBody)
			.set_token_uri(token_url);
	let meta = ResponseMetadataSlot::default();
	let instrumented = http_client.instrumented(meta.clone());
	let username = ResourceOwnerUsername::new(config.username.clone());
	let password = ResourceOwnerPassword::new(config.password.expose().to_owned());
	let response = oauth_client
		.exchange_password(&username, &password)
		.request_async(&instrumented)
		.await
		.map_err(|err| map_request_error(meta.take(), err))?;

	map_token_response(response, config.session_lifetime, OffsetDateTime::now_utc())
}

fn map_token_response(
	response: SalesforceTokenResponse,
	session_lifetime: Duration,
	now: OffsetDateTime,
) -> Result<AccessToken> {
	let extra = response.extra_fields();
	let issued_at = extra.issued_at.as_deref().and_then(parse_issued_at).unwrap_or(now);
	let lifetime = match response.expires_in() {
		Some(expires_in) => {
			let secs = i64::try_from(expires_in.as_secs())
				.map_err(|_| ConfigError::ExpiresInOutOfRange)?;

			if secs <= 0 {
				return Err(ConfigError::NonPositiveExpiresIn.into());
			}

			Duration::seconds(secs)
		},
		None => session_lifetime,
	};
	let token_type = match response.token_type().as_ref() {
		kind if kind.eq_ignore_ascii_case("bearer") => "Bearer".to_owned(),
		kind => kind.to_owned(),
	};
	let mut builder = AccessToken::builder()
		.access_token(response.access_token().secret().to_owned())
		.token_type(token_type)
		.issued_at(issued_at)
		.expires_in(lifetime);

	if let Some(raw) = extra.instance_url.as_deref() {
		let url = Url::parse(raw).map_err(|e| TransientError::TokenEndpoint {
			message: format!("instance_url `{raw}` is not a valid URL ({e})"),
			status: None,
		})?;

		builder = builder.instance_url(url);
	}
	if let Some(id) = extra.id.as_deref() {
		builder = builder.identity_url(id);
	}

	builder.build().map_err(|e| ConfigError::from(e).into())
}

fn parse_issued_at(raw: &str) -> Option<OffsetDateTime> {
	let millis = raw.trim().parse::<i128>().ok()?;

	OffsetDateTime::from_unix_timestamp_nanos(millis.checked_mul(1_000_000)?).ok()
}

fn map_request_error(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<ReqwestError>>,
) -> Error {
	let status = meta.and_then(|value| value.status);

	match err {
		RequestTokenError::ServerResponse(response) => map_server_response_error(response, status),
		RequestTokenError::Request(error) => map_transport_error(error, status),
		RequestTokenError::Parse(source, _body) =>
			TransientError::TokenResponseParse { source, status }.into(),
		RequestTokenError::Other(message) =>
			TransientError::TokenEndpoint { message, status }.into(),
	}
}

fn map_server_response_error(response: BasicErrorResponse, status: Option<u16>) -> Error {
	let code = response.error().as_ref().to_owned();
	let description = response.error_description().cloned();
	let message = match description.as_deref() {
		Some(description) => format!("{code} ({description})"),
		None => code.clone(),
	};

	match classify_token_error(Some(&code), description.as_deref(), status) {
		TokenErrorKind::InvalidGrant => Error::InvalidGrant { reason: message },
		TokenErrorKind::InvalidClient => Error::InvalidClient { reason: message },
		TokenErrorKind::Transient => TransientError::TokenEndpoint { message, status }.into(),
	}
}

fn map_transport_error(err: HttpClientError<ReqwestError>, status: Option<u16>) -> Error {
	match err {
		HttpClientError::Reqwest(inner) => map_reqwest_error(*inner),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransientError::TokenEndpoint {
			message: format!("HTTP client error: {message}"),
			status,
		}
		.into(),
		_ => TransientError::TokenEndpoint { message: "HTTP client error".into(), status }.into(),
	}
}

/// Maps a reqwest failure into the client taxonomy.
pub(crate) fn map_reqwest_error(err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::Timeout { endpoint: "Salesforce endpoint" }.into();
	}

	TransportError::from(err).into()
}

/// Classifies an OAuth error returned by the token endpoint.
///
/// Structured `error` codes win, then keywords in `error_description`, then the HTTP status.
pub fn classify_token_error(
	error: Option<&str>,
	description: Option<&str>,
	status: Option<u16>,
) -> TokenErrorKind {
	error
		.and_then(match_exact_value)
		.or_else(|| description.and_then(match_exact_value))
		.or_else(|| error.and_then(match_keywords))
		.or_else(|| description.and_then(match_keywords))
		.unwrap_or_else(|| classify_status(status))
}

fn match_exact_value(value: &str) -> Option<TokenErrorKind> {
	if value.eq_ignore_ascii_case("invalid_grant")
		|| value.eq_ignore_ascii_case("access_denied")
		|| value.eq_ignore_ascii_case("inactive_user")
		|| value.eq_ignore_ascii_case("authentication failure")
	{
		Some(TokenErrorKind::InvalidGrant)
	} else if value.eq_ignore_ascii_case("invalid_client")
		|| value.eq_ignore_ascii_case("invalid_client_id")
		|| value.eq_ignore_ascii_case("invalid_client_credentials")
		|| value.eq_ignore_ascii_case("unauthorized_client")
	{
		Some(TokenErrorKind::InvalidClient)
	} else if value.eq_ignore_ascii_case("temporarily_unavailable")
		|| value.eq_ignore_ascii_case("server_error")
	{
		Some(TokenErrorKind::Transient)
	} else {
		None
	}
}

fn match_keywords(text: &str) -> Option<TokenErrorKind> {
	let lowered = text.to_ascii_lowercase();

	match lowered.as_str() {
		text if text.contains("invalid_client") || text.contains("client secret") =>
			Some(TokenErrorKind::InvalidClient),
		text if text.contains("invalid_grant")
			|| text.contains("authentication failure")
			|| text.contains("locked") =>
			Some(TokenErrorKind::InvalidGrant),
		_ => None,
	}
}

fn classify_status(status: Option<u16>) -> TokenErrorKind {
	match status {
		Some(400) => TokenErrorKind::InvalidGrant,
		Some(401) => TokenErrorKind::InvalidClient,
		_ => TokenErrorKind::Transient,
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn response(body: &str) -> SalesforceTokenResponse {
		serde_json::from_str(body).expect("Token response fixture should decode.")
	}

	#[test]
	fn token_response_uses_issued_at_and_session_lifetime() {
		let token = map_token_response(
			response(
				r#"{"access_token":"00D!abc","instance_url":"https://acme.my.salesforce.com","id":"https://login.salesforce.com/id/00D/005","token_type":"Bearer","issued_at":"1735689600000","signature":"sig"}"#,
			),
			Duration::hours(2),
			macros::datetime!(2030-01-01 00:00 UTC),
		)
		.expect("Salesforce token responses should map.");

		assert_eq!(token.access_token.expose(), "00D!abc");
		assert_eq!(token.issued_at, macros::datetime!(2025-01-01 00:00 UTC));
		assert_eq!(token.expires_at, macros::datetime!(2025-01-01 02:00 UTC));
		assert_eq!(
			token.instance_url.as_ref().map(Url::as_str),
			Some("https://acme.my.salesforce.com/")
		);
		assert_eq!(token.identity_url.as_deref(), Some("https://login.salesforce.com/id/00D/005"));
	}

	#[test]
	fn token_response_prefers_expires_in() {
		let now = macros::datetime!(2025-06-01 12:00 UTC);
		let token = map_token_response(
			response(r#"{"access_token":"t","token_type":"bearer","expires_in":900}"#),
			Duration::hours(2),
			now,
		)
		.expect("Standard token responses should map.");

		assert_eq!(token.issued_at, now);
		assert_eq!(token.expires_at, now + Duration::minutes(15));
		assert!(token.instance_url.is_none());
	}

	#[test]
	fn token_response_rejects_bad_instance_url() {
		let err = map_token_response(
			response(r#"{"access_token":"t","token_type":"Bearer","instance_url":"::nope"}"#),
			Duration::hours(2),
			OffsetDateTime::now_utc(),
		)
		.expect_err("Invalid instance URLs should be rejected.");

		assert!(matches!(err, Error::Transient(TransientError::TokenEndpoint { .. })));
	}

	#[test]
	fn classification_prefers_error_codes() {
		assert_eq!(
			classify_token_error(Some("invalid_grant"), Some("authentication failure"), Some(400)),
			TokenErrorKind::InvalidGrant
		);
		assert_eq!(
			classify_token_error(
				Some("invalid_client_id"),
				Some("client identifier invalid"),
				Some(400)
			),
			TokenErrorKind::InvalidClient
		);
		assert_eq!(
			classify_token_error(
				Some("invalid_client"),
				Some("invalid client credentials"),
				Some(400)
			),
			TokenErrorKind::InvalidClient
		);
		assert_eq!(
			classify_token_error(Some("unsupported_grant_type"), None, Some(400)),
			TokenErrorKind::InvalidGrant
		);
		assert_eq!(
			classify_token_error(Some("unknown_error"), Some("retry your request"), Some(503)),
			TokenErrorKind::Transient
		);
		assert_eq!(classify_token_error(None, None, Some(401)), TokenErrorKind::InvalidClient);
	}

	#[test]
	fn issued_at_parses_epoch_millis() {
		assert_eq!(
			parse_issued_at("1735689600000"),
			Some(macros::datetime!(2025-01-01 00:00 UTC))
		);
		assert_eq!(parse_issued_at("yesterday"), None);
	}
}
