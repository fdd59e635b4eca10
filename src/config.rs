//! Connected-app credentials, org endpoints, and token lifetime settings.
//!
//! [`ClientConfig`] is validated once at construction so every later request can derive its
//! URLs without failing on bad input. Values come from the builder, from any key lookup via
//! [`ClientConfig::from_vars`], or from the process environment (optionally seeded from a
//! `.env` file).

// self
use crate::{_prelude::*, auth::Secret, error::ConfigError};

/// Environment keys understood by [`ClientConfig::from_vars`].
pub mod keys {
	/// Org base URL.
	pub const ORG_URL: &str = "ORG_URL";
	/// Connected-app consumer key.
	pub const CLIENT_ID: &str = "CLIENT_ID";
	/// Connected-app consumer secret.
	pub const CLIENT_SECRET: &str = "CLIENT_SECRET";
	/// Integration user name.
	pub const USERNAME: &str = "USERNAME";
	/// Integration user password (with the security token appended when the org needs one).
	pub const PASSWORD: &str = "PASSWORD";
	/// REST API major version.
	pub const API_VERSION: &str = "API_VERSION";
}

/// Validated client configuration.
#[derive(Clone, Debug)]
pub struct ClientConfig {
	/// Org base URL used for both the token endpoint and REST calls.
	pub org_url: Url,
	/// REST API major version.
	pub api_version: u32,
	/// Connected-app consumer key.
	pub client_id: String,
	/// Connected-app consumer secret.
	pub client_secret: Secret,
	/// Integration user name.
	pub username: String,
	/// Integration user password.
	pub password: Secret,
	/// Lifetime assumed when the token endpoint omits `expires_in`.
	pub session_lifetime: Duration,
	/// Cached tokens this close to expiry are replaced before use.
	pub refresh_window: Duration,
}
impl ClientConfig {
	/// REST API version used when none is configured.
	pub const DEFAULT_API_VERSION: u32 = 61;
	/// Default session lifetime; the platform issues two-hour sessions unless the org
	/// overrides it.
	pub const DEFAULT_SESSION_LIFETIME: Duration = Duration::hours(2);
	/// Default refresh window.
	pub const DEFAULT_REFRESH_WINDOW: Duration = Duration::seconds(60);

	/// Creates a new builder for the provided org URL.
	pub fn builder(org_url: impl Into<String>) -> ClientConfigBuilder {
		ClientConfigBuilder::new(org_url)
	}

	/// Builds a configuration from a key lookup (see [`keys`]).
	pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let require = |key: &'static str| {
			lookup(key).filter(|value| !value.is_empty()).ok_or(ConfigError::MissingEnv { key })
		};
		let mut builder = ClientConfigBuilder::new(require(keys::ORG_URL)?)
			.client_id(require(keys::CLIENT_ID)?)
			.client_secret(require(keys::CLIENT_SECRET)?)
			.username(require(keys::USERNAME)?)
			.password(require(keys::PASSWORD)?);

		if let Some(raw) = lookup(keys::API_VERSION).filter(|value| !value.trim().is_empty()) {
			builder = builder.api_version(parse_api_version(&raw)?);
		}

		builder.build()
	}

	/// Builds a configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_vars(|key| std::env::var(key).ok())
	}

	/// Loads `.env` from the working directory (or a parent) when present, then reads the
	/// process environment.
	///
	/// A missing file is ignored; a file that cannot be read or parsed is an error.
	pub fn from_dotenv() -> Result<Self, ConfigError> {
		tolerate_missing_dotenv(dotenv::dotenv().map(drop))?;

		Self::from_env()
	}

	/// Returns the versioned REST base, e.g. `https://org.my.salesforce.com/services/data/v61.0`.
	pub fn api_base(&self) -> String {
		format!("{}{}", self.origin(), self.version_prefix())
	}

	/// Returns the OAuth token endpoint.
	pub fn token_url(&self) -> Result<Url, ConfigError> {
		Url::parse(&format!("{}/services/oauth2/token", self.origin()))
			.map_err(|source| ConfigError::InvalidEndpoint { source })
	}

	/// Returns the server-relative path of a REST resource, as used inside composite
	/// sub-requests.
	pub fn resource_path(&self, path: &str) -> String {
		format!("{}{path}", self.version_prefix())
	}

	/// Builds the absolute URL for a REST path plus query pairs.
	pub fn endpoint(&self, path: &str, query: &[(String, String)]) -> Result<Url, ConfigError> {
		let mut url = Url::parse(&format!("{}{path}", self.api_base()))
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;

		if !query.is_empty() {
			url.query_pairs_mut().extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
		}

		Ok(url)
	}

	fn origin(&self) -> &str {
		self.org_url.as_str().trim_end_matches('/')
	}

	fn version_prefix(&self) -> String {
		format!("/services/data/v{}.0", self.api_version)
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	org_url: String,
	api_version: u32,
	client_id: String,
	client_secret: Secret,
	username: String,
	password: Secret,
	session_lifetime: Duration,
	refresh_window: Duration,
}
impl ClientConfigBuilder {
	/// Creates a new builder seeded with the org URL and defaults.
	pub fn new(org_url: impl Into<String>) -> Self {
		Self {
			org_url: org_url.into(),
			api_version: ClientConfig::DEFAULT_API_VERSION,
			client_id: String::new(),
			client_secret: Secret::new(""),
			username: String::new(),
			password: Secret::new(""),
			session_lifetime: ClientConfig::DEFAULT_SESSION_LIFETIME,
			refresh_window: ClientConfig::DEFAULT_REFRESH_WINDOW,
		}
	}

	/// Sets the REST API major version.
	pub fn api_version(mut self, version: u32) -> Self {
		self.api_version = version;

		self
	}

	/// Sets the connected-app consumer key.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = client_id.into();

		self
	}

	/// Sets the connected-app consumer secret.
	pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Secret::new(secret);

		self
	}

	/// Sets the integration user name.
	pub fn username(mut self, username: impl Into<String>) -> Self {
		self.username = username.into();

		self
	}

	/// Sets the integration user password.
	pub fn password(mut self, password: impl Into<String>) -> Self {
		self.password = Secret::new(password);

		self
	}

	/// Overrides the lifetime assumed for tokens without `expires_in`.
	pub fn session_lifetime(mut self, lifetime: Duration) -> Self {
		self.session_lifetime = lifetime;

		self
	}

	/// Overrides the refresh window (negative values clamp to zero).
	pub fn refresh_window(mut self, window: Duration) -> Self {
		self.refresh_window = if window.is_negative() { Duration::ZERO } else { window };

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let org_url = parse_org_url(&self.org_url)?;

		if self.api_version == 0 {
			return Err(ConfigError::InvalidApiVersion { value: self.api_version.to_string() });
		}
		if self.client_id.is_empty() {
			return Err(ConfigError::MissingField { field: "client_id" });
		}
		if self.client_secret.is_empty() {
			return Err(ConfigError::MissingField { field: "client_secret" });
		}
		if self.username.is_empty() {
			return Err(ConfigError::MissingField { field: "username" });
		}
		if self.password.is_empty() {
			return Err(ConfigError::MissingField { field: "password" });
		}
		if !self.session_lifetime.is_positive() {
			return Err(ConfigError::InvalidSessionLifetime { lifetime: self.session_lifetime });
		}

		Ok(ClientConfig {
			org_url,
			api_version: self.api_version,
			client_id: self.client_id,
			client_secret: self.client_secret,
			username: self.username,
			password: self.password,
			session_lifetime: self.session_lifetime,
			refresh_window: self.refresh_window,
		})
	}
}

fn tolerate_missing_dotenv(result: Result<(), dotenv::Error>) -> Result<(), ConfigError> {
	match result {
		Err(dotenv::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
		Err(source) => Err(ConfigError::Dotenv { source }),
		Ok(()) => Ok(()),
	}
}

fn parse_org_url(raw: &str) -> Result<Url, ConfigError> {
	let invalid =
		|reason: &str| ConfigError::InvalidOrgUrl { url: raw.to_owned(), reason: reason.into() };

	if raw.trim().is_empty() {
		return Err(ConfigError::MissingField { field: "org_url" });
	}

	let url = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;

	if !matches!(url.scheme(), "http" | "https") {
		return Err(invalid("scheme must be http or https"));
	}
	if url.host_str().is_none() {
		return Err(invalid("host is missing"));
	}
	if url.query().is_some() || url.fragment().is_some() {
		return Err(invalid("query strings and fragments are not allowed"));
	}

	Ok(url)
}

fn parse_api_version(raw: &str) -> Result<u32, ConfigError> {
	let trimmed = raw.trim();
	// Accept `61`, `61.0`, and `v61.0`.
	let major = trimmed.trim_start_matches(['v', 'V']).trim_end_matches(".0");

	major
		.parse::<u32>()
		.ok()
		.filter(|version| *version > 0)
		.ok_or_else(|| ConfigError::InvalidApiVersion { value: raw.to_owned() })
}

#[cfg(test)]
mod tests {
	// std
	use std::collections::HashMap;
	// self
	use super::*;

	fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> =
			pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();

		move |key| map.get(key).cloned()
	}

	fn complete() -> Vec<(&'static str, &'static str)> {
		vec![
			(keys::ORG_URL, "https://acme.my.salesforce.com"),
			(keys::CLIENT_ID, "consumer-key"),
			(keys::CLIENT_SECRET, "consumer-secret"),
			(keys::USERNAME, "integration@acme.test"),
			(keys::PASSWORD, "pass+token"),
		]
	}

	#[test]
	fn from_vars_applies_defaults() {
		let config = ClientConfig::from_vars(vars(&complete())).expect("Config should load.");

		assert_eq!(config.api_version, 61);
		assert_eq!(config.api_base(), "https://acme.my.salesforce.com/services/data/v61.0");
		assert_eq!(
			config.token_url().expect("Token URL should build.").as_str(),
			"https://acme.my.salesforce.com/services/oauth2/token"
		);
		assert_eq!(
			config.resource_path("/sobjects/Account"),
			"/services/data/v61.0/sobjects/Account"
		);
		assert_eq!(config.session_lifetime, Duration::hours(2));
		assert_eq!(config.password.expose(), "pass+token");
	}

	#[test]
	fn from_vars_reads_api_version() {
		let mut pairs = complete();

		pairs.push((keys::API_VERSION, "v59.0"));

		let config = ClientConfig::from_vars(vars(&pairs)).expect("Config should load.");

		assert_eq!(config.api_version, 59);

		let mut pairs = complete();

		pairs.push((keys::API_VERSION, "sixty"));

		let err = ClientConfig::from_vars(vars(&pairs)).expect_err("Bad versions should fail.");

		assert!(matches!(err, ConfigError::InvalidApiVersion { .. }));
	}

	#[test]
	fn from_vars_reports_missing_keys() {
		let pairs: Vec<_> =
			complete().into_iter().filter(|(key, _)| *key != keys::CLIENT_SECRET).collect();
		let err = ClientConfig::from_vars(vars(&pairs)).expect_err("Missing keys should fail.");

		assert!(matches!(err, ConfigError::MissingEnv { key: "CLIENT_SECRET" }));
	}

	#[test]
	fn builder_rejects_bad_org_urls() {
		let base = |url: &str| {
			ClientConfig::builder(url)
				.client_id("id")
				.client_secret("secret")
				.username("user")
				.password("pass")
				.build()
		};

		assert!(matches!(base("ftp://acme.test"), Err(ConfigError::InvalidOrgUrl { .. })));
		assert!(matches!(base("not a url"), Err(ConfigError::InvalidOrgUrl { .. })));
		assert!(matches!(base("https://acme.test/?x=1"), Err(ConfigError::InvalidOrgUrl { .. })));
		assert!(matches!(base(""), Err(ConfigError::MissingField { field: "org_url" })));
		assert!(base("http://127.0.0.1:8080/").is_ok());
	}

	#[test]
	fn builder_rejects_non_positive_session_lifetime() {
		let err = ClientConfig::builder("https://acme.test")
			.client_id("id")
			.client_secret("secret")
			.username("user")
			.password("pass")
			.session_lifetime(Duration::ZERO)
			.build()
			.expect_err("A zero session lifetime should be rejected.");

		assert!(matches!(
			err,
			ConfigError::InvalidSessionLifetime { lifetime } if lifetime == Duration::ZERO
		));
	}

	#[test]
	fn dotenv_only_tolerates_a_missing_file() {
		let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "path not found");

		assert!(tolerate_missing_dotenv(Ok(())).is_ok());
		assert!(tolerate_missing_dotenv(Err(dotenv::Error::Io(missing))).is_ok());

		let line_error = dotenv::Error::LineParse("BAD LINE'".into(), 4);
		let malformed = tolerate_missing_dotenv(Err(line_error))
			.expect_err("Malformed `.env` lines should surface.");

		match malformed {
			ConfigError::Dotenv { source: dotenv::Error::LineParse(line, index) } => {
				assert_eq!(line, "BAD LINE'");
				assert_eq!(index, 4);
			},
			other => panic!("Unexpected error: {other:?}"),
		}

		let unreadable = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");

		assert!(matches!(
			tolerate_missing_dotenv(Err(dotenv::Error::Io(unreadable))),
			Err(ConfigError::Dotenv { source: dotenv::Error::Io(_) })
		));
	}

	#[test]
	fn endpoint_encodes_query_pairs() {
		let config = ClientConfig::builder("https://acme.test/")
			.client_id("id")
			.client_secret("secret")
			.username("user")
			.password("pass")
			.refresh_window(Duration::seconds(-5))
			.build()
			.expect("Config should build.");
		let url = config
			.endpoint("/query", &[("q".into(), "SELECT Id FROM Account WHERE Name = 'A&B'".into())])
			.expect("Endpoint should build.");

		assert_eq!(config.refresh_window, Duration::ZERO);
		assert_eq!(
			url.as_str(),
			"https://acme.test/services/data/v61.0/query?q=SELECT+Id+FROM+Account+WHERE+Name+%3D+%27A%26B%27"
		);
	}
}
