//! Composite batches and sObject collections.
//!
//! A composite request bundles up to 25 sub-requests that may reference each other's results
//! through `@{referenceId.field}` placeholders. Collections save or delete up to 200 records of
//! mixed types in a single round trip and report one [`SaveResult`] per record.

// crates.io
use serde::ser::SerializeMap;
// self
use crate::{
	_prelude::*,
	client::{self, SalesforceClient},
	error::{ApiError, ApiErrorDetail, ConfigError},
	http::FetchRequest,
	obs::{self, OperationKind},
	sobjects::SaveResult,
};

/// Maximum number of sub-requests in one composite call.
pub const COMPOSITE_LIMIT: usize = 25;
/// Maximum number of records in one collections call.
pub const COLLECTIONS_LIMIT: usize = 200;

/// One entry of a composite batch.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubRequest {
	/// HTTP method.
	#[serde(serialize_with = "serialize_method")]
	pub method: Method,
	/// Server-relative resource path, e.g. `/services/data/v61.0/sobjects/Account`.
	pub url: String,
	/// Unique id other sub-requests use to reference this one.
	pub reference_id: String,
	/// Optional JSON payload.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub body: Option<Value>,
	/// Extra headers for this sub-request.
	#[serde(skip_serializing_if = "BTreeMap::is_empty")]
	pub http_headers: BTreeMap<String, String>,
}
impl SubRequest {
	/// Creates a sub-request without body or headers.
	pub fn new(method: Method, url: impl Into<String>, reference_id: impl Into<String>) -> Self {
		Self {
			method,
			url: url.into(),
			reference_id: reference_id.into(),
			body: None,
			http_headers: BTreeMap::new(),
		}
	}

	/// Sets the JSON payload.
	pub fn body(mut self, body: Value) -> Self {
		self.body = Some(body);

		self
	}

	/// Serializes `body` as the JSON payload.
	pub fn json<B>(self, body: &B) -> Result<Self, ConfigError>
	where
		B: ?Sized + Serialize,
	{
		Ok(self.body(serde_json::to_value(body).map_err(ConfigError::RequestSerialize)?))
	}

	/// Adds a header to this sub-request.
	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.http_headers.insert(name.into(), value.into());

		self
	}
}

fn serialize_method<S>(method: &Method, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
	S: serde::Serializer,
{
	serializer.serialize_str(method.as_str())
}

/// Composite batch payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CompositeRequest {
	/// Roll back every sub-request when one fails.
	#[serde(rename = "allOrNone")]
	pub all_or_none: bool,
	/// Sub-requests, executed in order.
	#[serde(rename = "compositeRequest")]
	pub requests: Vec<SubRequest>,
}
impl CompositeRequest {
	/// Creates an empty batch.
	pub fn new(all_or_none: bool) -> Self {
		Self { all_or_none, requests: Vec::new() }
	}

	/// Appends a sub-request.
	pub fn push(mut self, request: SubRequest) -> Self {
		self.requests.push(request);

		self
	}

	fn validate(&self) -> Result<(), ConfigError> {
		check_batch_size("composite", self.requests.len(), COMPOSITE_LIMIT)?;

		let mut seen = HashSet::with_capacity(self.requests.len());

		for request in &self.requests {
			if request.reference_id.is_empty() || !seen.insert(request.reference_id.as_str()) {
				return Err(ConfigError::DuplicateReferenceId {
					reference_id: request.reference_id.clone(),
				});
			}
		}

		Ok(())
	}
}

/// Composite batch result.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeResponse {
	/// One entry per sub-request, in request order.
	pub composite_response: Vec<SubResponse>,
}
impl CompositeResponse {
	/// Looks up the result of a sub-request by reference id.
	pub fn get(&self, reference_id: &str) -> Option<&SubResponse> {
		self.composite_response.iter().find(|response| response.reference_id == reference_id)
	}
}

/// Result of one composite sub-request.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubResponse {
	/// Response payload; an error envelope when the sub-request failed.
	#[serde(default)]
	pub body: Value,
	/// Response headers.
	#[serde(default)]
	pub http_headers: BTreeMap<String, String>,
	/// HTTP status of the sub-request.
	pub http_status_code: u16,
	/// Reference id of the originating sub-request.
	pub reference_id: String,
}
impl SubResponse {
	/// Returns `true` for statuses below 300.
	pub fn is_success(&self) -> bool {
		self.http_status_code <= 299
	}

	/// Returns the sub-request failure as an [`ApiError`], if it failed.
	pub fn error(&self) -> Option<ApiError> {
		if self.is_success() {
			return None;
		}

		let errors = Vec::<ApiErrorDetail>::deserialize(&self.body).unwrap_or_default();

		Some(if errors.is_empty() {
			ApiError::from_response(self.http_status_code, self.body.to_string().as_bytes())
		} else {
			ApiError::from_details(self.http_status_code, errors)
		})
	}
}

/// A record in a collections batch, tagged with its sObject type.
#[derive(Clone, Debug, PartialEq)]
pub struct CollectionsRecord {
	/// sObject type written to `attributes.type`.
	pub object_type: String,
	/// Field values.
	pub fields: Record,
}
impl CollectionsRecord {
	/// Creates a record from a field map.
	pub fn new(object_type: impl Into<String>, fields: Record) -> Self {
		Self { object_type: object_type.into(), fields }
	}

	/// Creates a record from any value that serializes to a JSON object.
	pub fn from_serialize<B>(
		object_type: impl Into<String>,
		fields: &B,
	) -> Result<Self, ConfigError>
	where
		B: ?Sized + Serialize,
	{
		match serde_json::to_value(fields).map_err(ConfigError::RequestSerialize)? {
			Value::Object(fields) => Ok(Self::new(object_type, fields)),
			_ => Err(ConfigError::RequestSerialize(<serde_json::Error as serde::ser::Error>::custom(
				"collections records must serialize to a JSON object",
			))),
		}
	}

	fn id(&self) -> Option<&str> {
		self.fields.get("Id").and_then(Value::as_str).filter(|id| !id.is_empty())
	}
}
impl Serialize for CollectionsRecord {
	fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		#[derive(Serialize)]
		struct Attributes<'a> {
			#[serde(rename = "type")]
			object_type: &'a str,
		}

		let fields = self.fields.iter().filter(|(key, _)| key.as_str() != "attributes");
		let mut map = serializer.serialize_map(None)?;

		map.serialize_entry("attributes", &Attributes { object_type: &self.object_type })?;

		for (key, value) in fields {
			map.serialize_entry(key, value)?;
		}

		map.end()
	}
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CollectionsBody<'a> {
	all_or_none: bool,
	records: &'a [CollectionsRecord],
}

impl SalesforceClient {
	/// Executes a composite batch.
	pub async fn composite(&self, request: &CompositeRequest) -> Result<CompositeResponse> {
		obs::observe(OperationKind::Composite, "composite", async move {
			request.validate()?;

			let request = FetchRequest::post("/composite").json(request)?;

			self.send(request).await?.into_result()?.json()
		})
		.await
	}

	/// Creates up to 200 records of mixed types.
	pub async fn collections_create(
		&self,
		all_or_none: bool,
		records: &[CollectionsRecord],
	) -> Result<Vec<SaveResult>> {
		obs::observe(OperationKind::Collections, "collections_create", async move {
			check_records(records)?;

			let request = FetchRequest::post("/composite/sobjects")
				.json(&CollectionsBody { all_or_none, records })?;

			self.send(request).await?.into_result()?.json()
		})
		.await
	}

	/// Updates up to 200 records; each must carry its `Id` field.
	pub async fn collections_update(
		&self,
		all_or_none: bool,
		records: &[CollectionsRecord],
	) -> Result<Vec<SaveResult>> {
		obs::observe(OperationKind::Collections, "collections_update", async move {
			check_records(records)?;

			if let Some(index) = records.iter().position(|record| record.id().is_none()) {
				return Err(ConfigError::MissingRecordId { index }.into());
			}

			let request = FetchRequest::patch("/composite/sobjects")
				.json(&CollectionsBody { all_or_none, records })?;

			self.send(request).await?.into_result()?.json()
		})
		.await
	}

	/// Deletes up to 200 records by id.
	pub async fn collections_delete(
		&self,
		all_or_none: bool,
		ids: &[&str],
	) -> Result<Vec<SaveResult>> {
		obs::observe(OperationKind::Collections, "collections_delete", async move {
			check_batch_size("collections", ids.len(), COLLECTIONS_LIMIT)?;

			for id in ids {
				if id.contains(',') {
					return Err(ConfigError::InvalidPathSegment {
						kind: "record id",
						segment: (*id).to_owned(),
					}
					.into());
				}

				client::path_segment("record id", id)?;
			}

			let request = FetchRequest::delete("/composite/sobjects")
				.query_pair("ids", ids.join(","))
				.query_pair("allOrNone", all_or_none.to_string());

			self.send(request).await?.into_result()?.json()
		})
		.await
	}
}

fn check_records(records: &[CollectionsRecord]) -> Result<()> {
	check_batch_size("collections", records.len(), COLLECTIONS_LIMIT)?;

	for record in records {
		client::path_segment("object type", &record.object_type)?;
	}

	Ok(())
}

fn check_batch_size(operation: &'static str, actual: usize, max: usize) -> Result<(), ConfigError> {
	if actual == 0 {
		return Err(ConfigError::EmptyBatch { operation });
	}
	if actual > max {
		return Err(ConfigError::BatchTooLarge { operation, max, actual });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	fn record(object_type: &str, fields: Value) -> CollectionsRecord {
		match fields {
			Value::Object(fields) => CollectionsRecord::new(object_type, fields),
			other => panic!("Fixture must be an object: {other}"),
		}
	}

	#[test]
	fn composite_request_uses_wire_names() {
		let request = CompositeRequest::new(true)
			.push(
				SubRequest::new(Method::POST, "/services/data/v61.0/sobjects/Account", "NewAccount")
					.body(json!({ "Name": "Acme" })),
			)
			.push(
				SubRequest::new(
					Method::GET,
					"/services/data/v61.0/sobjects/Account/@{NewAccount.id}",
					"ReadBack",
				)
				.header("Sforce-Auto-Assign", "FALSE"),
			);

		assert_eq!(
			serde_json::to_value(&request).expect("Composite request should serialize."),
			json!({
				"allOrNone": true,
				"compositeRequest": [
					{
						"method": "POST",
						"url": "/services/data/v61.0/sobjects/Account",
						"referenceId": "NewAccount",
						"body": { "Name": "Acme" }
					},
					{
						"method": "GET",
						"url": "/services/data/v61.0/sobjects/Account/@{NewAccount.id}",
						"referenceId": "ReadBack",
						"httpHeaders": { "Sforce-Auto-Assign": "FALSE" }
					}
				]
			})
		);
	}

	#[test]
	fn composite_validation_enforces_limits_and_unique_ids() {
		assert!(matches!(
			CompositeRequest::new(false).validate(),
			Err(ConfigError::EmptyBatch { operation: "composite" })
		));

		let oversized = (0..=COMPOSITE_LIMIT).fold(CompositeRequest::new(false), |batch, idx| {
			batch.push(SubRequest::new(Method::GET, "/x", format!("ref{idx}")))
		});

		assert!(matches!(
			oversized.validate(),
			Err(ConfigError::BatchTooLarge { max: 25, actual: 26, .. })
		));

		let duplicated = CompositeRequest::new(false)
			.push(SubRequest::new(Method::GET, "/x", "same"))
			.push(SubRequest::new(Method::GET, "/y", "same"));

		assert!(matches!(
			duplicated.validate(),
			Err(ConfigError::DuplicateReferenceId { reference_id }) if reference_id == "same"
		));

		let unnamed = CompositeRequest::new(false).push(SubRequest::new(Method::GET, "/x", ""));

		assert!(matches!(
			unnamed.validate(),
			Err(ConfigError::DuplicateReferenceId { reference_id }) if reference_id.is_empty()
		));
	}

	#[test]
	fn collections_record_tags_type_and_drops_stale_attributes() {
		let record = record(
			"Contact",
			json!({ "attributes": { "type": "Lead" }, "LastName": "Doe" }),
		);

		assert_eq!(
			serde_json::to_value(&record).expect("Record should serialize."),
			json!({ "attributes": { "type": "Contact" }, "LastName": "Doe" })
		);
	}

	#[test]
	fn collections_record_requires_object_payload() {
		assert!(CollectionsRecord::from_serialize("Account", &json!({ "Name": "Acme" })).is_ok());
		assert!(matches!(
			CollectionsRecord::from_serialize("Account", &json!(["Acme"])),
			Err(ConfigError::RequestSerialize(_))
		));
	}

	#[test]
	fn sub_response_surfaces_error_envelope() {
		let response: CompositeResponse = serde_json::from_value(json!({
			"compositeResponse": [
				{
					"body": { "id": "001A", "success": true, "errors": [] },
					"httpHeaders": { "Location": "/services/data/v61.0/sobjects/Account/001A" },
					"httpStatusCode": 201,
					"referenceId": "NewAccount"
				},
				{
					"body": [{ "errorCode": "PROCESSING_HALTED", "message": "The transaction was rolled back." }],
					"httpHeaders": {},
					"httpStatusCode": 400,
					"referenceId": "ReadBack"
				}
			]
		}))
		.expect("Composite response should decode.");

		let created = response.get("NewAccount").expect("First sub-response should exist.");

		assert!(created.is_success());
		assert!(created.error().is_none());

		let failed = response.get("ReadBack").expect("Second sub-response should exist.");
		let error = failed.error().expect("Failed sub-response should carry an error.");

		assert_eq!(error.status, 400);
		assert_eq!(error.error_code(), Some("PROCESSING_HALTED"));
	}
}
