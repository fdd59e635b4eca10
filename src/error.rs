//! Client-level error types shared across authentication, transport, and REST operations.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration or request-construction problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure or unexpected response.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The REST API rejected the request with a non-success status.
	#[error(transparent)]
	Api(#[from] ApiError),

	/// Token endpoint rejected the resource-owner credentials.
	#[error("Token endpoint rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Token endpoint rejected the connected-app credentials.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider-supplied reason string.
		reason: String,
	},
}
impl Error {
	/// Returns the HTTP status attached to the failure, if one was observed.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Api(err) => Some(err.status),
			Self::Transient(err) => err.status(),
			_ => None,
		}
	}
}

/// Configuration and validation failures raised before any request leaves the process.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A required configuration field was left empty.
	#[error("Configuration field `{field}` is required.")]
	MissingField {
		/// Field name.
		field: &'static str,
	},
	/// The session lifetime is zero or negative.
	#[error("Session lifetime must be positive; got {lifetime}.")]
	InvalidSessionLifetime {
		/// Configured lifetime.
		lifetime: Duration,
	},
	/// The `.env` file exists but could not be read or parsed.
	#[error("Unable to load the `.env` file.")]
	Dotenv {
		/// Underlying loader failure.
		#[source]
		source: dotenv::Error,
	},
	/// A required environment variable is not set.
	#[error("Environment variable `{key}` is not set.")]
	MissingEnv {
		/// Variable name.
		key: &'static str,
	},
	/// The API version is not a positive integer.
	#[error("API version `{value}` is invalid.")]
	InvalidApiVersion {
		/// Raw value that failed validation.
		value: String,
	},
	/// The org URL cannot be used as a REST base.
	#[error("Org URL `{url}` is invalid: {reason}.")]
	InvalidOrgUrl {
		/// Raw URL value.
		url: String,
		/// Why the URL was rejected.
		reason: String,
	},
	/// A derived endpoint URL could not be built.
	#[error("Endpoint URL is invalid.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// An object type, record id, or field name cannot be placed in a resource path.
	#[error("Path segment `{segment}` is invalid for the {kind}.")]
	InvalidPathSegment {
		/// Which part of the path failed validation.
		kind: &'static str,
		/// Offending value.
		segment: String,
	},
	/// Request body could not be serialized to JSON.
	#[error("Request body could not be serialized.")]
	RequestSerialize(#[source] serde_json::Error),
	/// Batch operations need at least one entry.
	#[error("The {operation} batch is empty.")]
	EmptyBatch {
		/// Batch operation label.
		operation: &'static str,
	},
	/// Batch exceeds the platform limit.
	#[error("The {operation} batch holds {actual} entries; the limit is {max}.")]
	BatchTooLarge {
		/// Batch operation label.
		operation: &'static str,
		/// Maximum accepted entries.
		max: usize,
		/// Entries supplied.
		actual: usize,
	},
	/// Composite sub-requests must carry unique reference ids.
	#[error("Composite reference id `{reference_id}` is empty or duplicated.")]
	DuplicateReferenceId {
		/// Offending reference id.
		reference_id: String,
	},
	/// Collection updates need an `Id` field on every record.
	#[error("Collection record at index {index} is missing an `Id` field.")]
	MissingRecordId {
		/// Position of the record in the batch.
		index: usize,
	},
	/// Token record builder validation failed.
	#[error("Unable to build access token.")]
	TokenBuild(#[from] crate::auth::AccessTokenBuilderError),
	/// Token endpoint returned a non-positive `expires_in`.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failures and responses the client could not interpret.
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Token endpoint returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint responded with malformed JSON.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// REST API responded with a body that does not match the expected envelope.
	#[error("REST API returned malformed JSON (status {status}).")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code.
		status: u16,
	},
	/// REST API responded successfully but omitted data the operation needs.
	#[error("REST API returned an unexpected response: {message}.")]
	UnexpectedResponse {
		/// Message summarizing the mismatch.
		message: String,
		/// HTTP status code.
		status: u16,
	},
	/// The request did not complete in time.
	#[error("Request timed out while calling the {endpoint}.")]
	Timeout {
		/// Endpoint label.
		endpoint: &'static str,
	},
}
impl TransientError {
	/// Returns the HTTP status attached to the failure, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::TokenEndpoint { status, .. } | Self::TokenResponseParse { status, .. } =>
				*status,
			Self::ResponseParse { status, .. } | Self::UnexpectedResponse { status, .. } =>
				Some(*status),
			Self::Timeout { .. } => None,
		}
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling Salesforce.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling Salesforce.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// One entry of the REST API error envelope.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorDetail {
	/// Platform error code (`errorCode`, or `statusCode` inside batch results).
	#[serde(rename = "errorCode", alias = "statusCode", default)]
	pub error_code: String,
	/// Human-readable message.
	#[serde(default)]
	pub message: String,
	/// Fields implicated by the failure.
	#[serde(default, deserialize_with = "fields_from_string_or_list")]
	pub fields: Vec<String>,
}

/// Non-success response returned by the REST API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiError {
	/// HTTP status code.
	pub status: u16,
	/// Decoded error envelope; empty when the body was not an envelope.
	pub errors: Vec<ApiErrorDetail>,
	/// Truncated raw body, kept when the envelope could not be decoded.
	pub body_preview: Option<String>,
}
impl ApiError {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Decodes the `[{ errorCode, message, fields }]` envelope carried by a failed response.
	pub fn from_response(status: u16, body: &[u8]) -> Self {
		match serde_json::from_slice::<Vec<ApiErrorDetail>>(body) {
			Ok(errors) if !errors.is_empty() => Self { status, errors, body_preview: None },
			_ => Self::with_preview(status, Vec::new(), body),
		}
	}

	/// Builds an error from per-record failures reported inside a success status.
	pub fn from_details(status: u16, errors: Vec<ApiErrorDetail>) -> Self {
		Self { status, errors, body_preview: None }
	}

	fn with_preview(status: u16, errors: Vec<ApiErrorDetail>, body: &[u8]) -> Self {
		let text = String::from_utf8_lossy(body);
		let trimmed = text.trim();
		let body_preview =
			if trimmed.is_empty() { None } else { Some(truncate_preview(trimmed)) };

		Self { status, errors, body_preview }
	}

	/// Returns the first error message, falling back to the body preview.
	pub fn message(&self) -> &str {
		self.errors
			.first()
			.map(|detail| detail.message.as_str())
			.or(self.body_preview.as_deref())
			.unwrap_or("no error details")
	}

	/// Returns the first platform error code, if the envelope carried one.
	pub fn error_code(&self) -> Option<&str> {
		self.errors.first().map(|detail| detail.error_code.as_str()).filter(|code| !code.is_empty())
	}

	/// Returns `true` when the session token was rejected.
	pub fn is_unauthorized(&self) -> bool {
		self.status == StatusCode::UNAUTHORIZED.as_u16()
	}
}
impl Display for ApiError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Salesforce API returned status {}: {}.", self.status, self.message())
	}
}
impl StdError for ApiError {}

fn truncate_preview(body: &str) -> String {
	let mut buf = String::new();

	for (idx, ch) in body.chars().enumerate() {
		if idx >= ApiError::BODY_PREVIEW_LIMIT {
			buf.push('…');

			break;
		}

		buf.push(ch);
	}

	buf
}

fn fields_from_string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
	D: serde::Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Fields {
		List(Vec<String>),
		One(String),
		Null,
	}

	Ok(match Fields::deserialize(deserializer)? {
		Fields::List(list) => list,
		Fields::One(value) if value.is_empty() => Vec::new(),
		Fields::One(value) => vec![value],
		Fields::Null => Vec::new(),
	})
}
