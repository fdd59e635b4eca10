//! Transport primitives shared by the token exchange and the REST fetch helper.
//!
//! [`ReqwestHttpClient`] is the only HTTP stack the client talks through. Token requests go
//! through an [`InstrumentedHandle`] so the status of a failed grant is available when the
//! `oauth2` crate reports an error; REST calls use [`FetchRequest`] and [`FetchResponse`].

// std
use std::ops::Deref;
// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
// self
use crate::{_prelude::*, error::ConfigError};

/// Response details captured from the most recent token request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the token endpoint, if available.
	pub status: Option<u16>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
///
/// The client creates a fresh slot for each token request and reads the captured metadata
/// right after `oauth2` resolves.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client with a total request timeout.
	pub fn with_timeout(timeout: std::time::Duration) -> Result<Self, ConfigError> {
		Ok(Self(ReqwestClient::builder().timeout(timeout).build()?))
	}

	/// Builds an instrumented handle that captures response metadata for token requests.
	pub(crate) fn instrumented(&self, slot: ResponseMetadataSlot) -> InstrumentedHandle {
		InstrumentedHandle::new(self.0.clone(), slot)
	}
}
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl Debug for ReqwestHttpClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("ReqwestHttpClient(..)")
	}
}

/// Instrumented adapter that implements [`AsyncHttpClient`] for reqwest.
pub(crate) struct InstrumentedHttpClient {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}

/// Handle returned by [`ReqwestHttpClient`] for a single token request.
#[derive(Clone)]
pub struct InstrumentedHandle(Arc<InstrumentedHttpClient>);
impl InstrumentedHandle {
	fn new(client: ReqwestClient, slot: ResponseMetadataSlot) -> Self {
		Self(Arc::new(InstrumentedHttpClient { client, slot }))
	}
}
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = Arc::clone(&self.0);

		Box::pin(async move {
			client.slot.take();

			let response = client
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();

			client.slot.store(ResponseMetadata { status: Some(status.as_u16()) });

			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

/// Low-level REST request relative to the versioned API base.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchRequest {
	/// HTTP method.
	pub method: Method,
	/// Path appended to `/services/data/vXX.0`, starting with `/`.
	pub path: String,
	/// Query pairs, form-encoded onto the URL in order.
	pub query: Vec<(String, String)>,
	/// Pre-serialized JSON body.
	pub body: Option<Vec<u8>>,
}
impl FetchRequest {
	/// Creates a request without query pairs or body.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self { method, path: path.into(), query: Vec::new(), body: None }
	}

	/// Shorthand for a `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// Shorthand for a `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::POST, path)
	}

	/// Shorthand for a `PATCH` request.
	pub fn patch(path: impl Into<String>) -> Self {
		Self::new(Method::PATCH, path)
	}

	/// Shorthand for a `DELETE` request.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::DELETE, path)
	}

	/// Appends a query pair.
	pub fn query_pair(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Serializes `body` as the JSON payload.
	pub fn json<B>(mut self, body: &B) -> Result<Self, ConfigError>
	where
		B: ?Sized + Serialize,
	{
		self.body = Some(serde_json::to_vec(body).map_err(ConfigError::RequestSerialize)?);

		Ok(self)
	}
}

/// Raw REST response: status plus body bytes, returned for every HTTP status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response body.
	pub body: Vec<u8>,
}
impl FetchResponse {
	/// Returns `true` for statuses below 300.
	pub fn is_success(&self) -> bool {
		self.status <= 299
	}

	/// Converts non-success responses into [`Error::Api`](crate::error::Error::Api).
	pub fn into_result(self) -> Result<Self> {
		if self.is_success() {
			Ok(self)
		} else {
			Err(crate::error::ApiError::from_response(self.status, &self.body).into())
		}
	}

	/// Decodes the body as JSON, reporting the failing path on mismatch.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de).map_err(|source| {
			crate::error::TransientError::ResponseParse { source, status: self.status }.into()
		})
	}

	/// Returns `true` when the body is empty or whitespace.
	pub fn is_empty(&self) -> bool {
		self.body.iter().all(u8::is_ascii_whitespace)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::{ApiError, TransientError};

	#[test]
	fn fetch_request_serializes_body_and_query() {
		let request = FetchRequest::post("/sobjects/Account/")
			.query_pair("fields", "Id,Name")
			.json(&serde_json::json!({ "Name": "Acme" }))
			.expect("JSON body should serialize.");

		assert_eq!(request.method, Method::POST);
		assert_eq!(request.query, vec![("fields".to_owned(), "Id,Name".to_owned())]);
		assert_eq!(request.body.as_deref(), Some(br#"{"Name":"Acme"}"#.as_slice()));
	}

	#[test]
	fn fetch_response_classifies_status() {
		let ok = FetchResponse { status: 204, body: Vec::new() };

		assert!(ok.is_success());
		assert!(ok.is_empty());
		assert!(ok.into_result().is_ok());

		let err = FetchResponse {
			status: 400,
			body: br#"[{"errorCode":"MALFORMED_QUERY","message":"unexpected token"}]"#.to_vec(),
		}
		.into_result()
		.expect_err("Status 400 should surface as an API error.");

		match err {
			Error::Api(ApiError { status, errors, .. }) => {
				assert_eq!(status, 400);
				assert_eq!(errors[0].error_code, "MALFORMED_QUERY");
			},
			other => panic!("Unexpected error: {other:?}"),
		}
	}

	#[test]
	fn fetch_response_reports_parse_path() {
		#[derive(Debug, Deserialize)]
		struct Envelope {
			#[allow(dead_code)]
			done: bool,
		}

		let response = FetchResponse { status: 200, body: br#"{"done":"yes"}"#.to_vec() };
		let err = response.json::<Envelope>().expect_err("Mismatched types should fail.");

		match err {
			Error::Transient(TransientError::ResponseParse { source, status }) => {
				assert_eq!(status, 200);
				assert_eq!(source.path().to_string(), "done");
			},
			other => panic!("Unexpected error: {other:?}"),
		}
	}
}
