//! Access-token records issued by the password grant, plus their builder.

// self
use crate::{_prelude::*, auth::Secret};

/// Lifecycle status for an access token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Token is currently valid.
	Active,
	/// Token reached its expiry instant.
	Expired,
}

/// Errors produced by [`AccessTokenBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum AccessTokenBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
}

/// Bearer token returned by the token endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct AccessToken {
	/// Bearer secret; callers must avoid logging it.
	pub access_token: Secret,
	/// Token type reported by the endpoint (always `Bearer` in practice).
	pub token_type: String,
	/// Instance URL the org asked clients to use, when reported.
	pub instance_url: Option<Url>,
	/// Identity URL for the authenticated user, when reported.
	pub identity_url: Option<String>,
	/// Issued-at instant.
	pub issued_at: OffsetDateTime,
	/// Instant after which the token must not be reused.
	pub expires_at: OffsetDateTime,
}
impl AccessToken {
	/// Returns a builder for assembling token records.
	pub fn builder() -> AccessTokenBuilder {
		AccessTokenBuilder::default()
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> TokenStatus {
		if instant >= self.expires_at { TokenStatus::Expired } else { TokenStatus::Active }
	}

	/// Returns `true` if the token has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), TokenStatus::Expired)
	}

	/// Returns `true` if the token is expired relative to the current clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}

	/// Determines whether the token should be replaced before use.
	///
	/// Tokens within `window` of their expiry count as stale so an in-flight request never
	/// carries a token that lapses mid-call.
	pub fn needs_refresh(&self, now: OffsetDateTime, window: Duration) -> bool {
		if self.is_expired_at(now) {
			return true;
		}
		if window <= Duration::ZERO {
			return false;
		}

		self.expires_at - now <= window
	}

	/// Formats the `Authorization` header value.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.access_token.expose())
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessToken")
			.field("access_token", &"<redacted>")
			.field("token_type", &self.token_type)
			.field("instance_url", &self.instance_url.as_ref().map(Url::as_str))
			.field("identity_url", &self.identity_url)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`AccessToken`].
#[derive(Clone, Debug, Default)]
pub struct AccessTokenBuilder {
	access_token: Option<Secret>,
	token_type: Option<String>,
	instance_url: Option<Url>,
	identity_url: Option<String>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl AccessTokenBuilder {
	/// Provides the bearer value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(Secret::new(token));

		self
	}

	/// Sets the token type label.
	pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = Some(token_type.into());

		self
	}

	/// Sets the instance URL reported alongside the token.
	pub fn instance_url(mut self, url: Url) -> Self {
		self.instance_url = Some(url);

		self
	}

	/// Sets the identity URL reported alongside the token.
	pub fn identity_url(mut self, url: impl Into<String>) -> Self {
		self.identity_url = Some(url.into());

		self
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Consumes the builder and produces an [`AccessToken`].
	pub fn build(self) -> Result<AccessToken, AccessTokenBuilderError> {
		let access_token = self
			.access_token
			.filter(|secret| !secret.is_empty())
			.ok_or(AccessTokenBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => issued_at + delta,
			(None, None) => return Err(AccessTokenBuilderError::MissingExpiry),
		};

		Ok(AccessToken {
			access_token,
			token_type: self.token_type.unwrap_or_else(|| "Bearer".into()),
			instance_url: self.instance_url,
			identity_url: self.identity_url,
			issued_at,
			expires_at,
		})
	}
}
