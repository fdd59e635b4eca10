//! Single-record sObject operations: create, update, delete, and reads by id or external id.

// self
use crate::{
	_prelude::*,
	client::{self, SalesforceClient},
	error::{ApiError, ApiErrorDetail, TransientError},
	http::FetchRequest,
	obs::{self, OperationKind},
};

/// Outcome of a create, or of one record in a collections batch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveResult {
	/// Record id; absent when the save failed.
	#[serde(default)]
	pub id: Option<String>,
	/// Whether the record was saved.
	pub success: bool,
	/// Errors reported for the record.
	#[serde(default)]
	pub errors: Vec<ApiErrorDetail>,
}

impl SalesforceClient {
	/// Creates a record and returns its id.
	pub async fn create<B>(&self, object_type: &str, body: &B) -> Result<String>
	where
		B: ?Sized + Serialize,
	{
		obs::observe(OperationKind::Create, "create", async move {
			let object_type = client::path_segment("object type", object_type)?;
			let request = FetchRequest::post(format!("/sobjects/{object_type}/")).json(body)?;
			let response = self.send(request).await?.into_result()?;
			let status = response.status;
			let result = response.json::<SaveResult>()?;

			if !result.success {
				return Err(ApiError::from_details(status, result.errors).into());
			}

			result.id.filter(|id| !id.is_empty()).ok_or_else(|| {
				TransientError::UnexpectedResponse {
					message: "create response did not carry a record id".into(),
					status,
				}
				.into()
			})
		})
		.await
	}

	/// Updates the fields present in `body` on an existing record.
	pub async fn update<B>(&self, object_type: &str, id: &str, body: &B) -> Result<()>
	where
		B: ?Sized + Serialize,
	{
		obs::observe(OperationKind::Update, "update", async move {
			let path = record_path(object_type, id)?;
			let request = FetchRequest::patch(path).json(body)?;

			self.send(request).await?.into_result()?;

			Ok(())
		})
		.await
	}

	/// Deletes a record.
	pub async fn delete(&self, object_type: &str, id: &str) -> Result<()> {
		obs::observe(OperationKind::Delete, "delete", async move {
			let path = record_path(object_type, id)?;

			self.send(FetchRequest::delete(path)).await?.into_result()?;

			Ok(())
		})
		.await
	}

	/// Reads a record by id. An empty `fields` slice returns every field the user can see.
	pub async fn get_by_id(&self, object_type: &str, id: &str, fields: &[&str]) -> Result<Record> {
		self.get_by_id_as(object_type, id, fields).await
	}

	/// Reads a record by id and decodes it into `T`.
	pub async fn get_by_id_as<T>(&self, object_type: &str, id: &str, fields: &[&str]) -> Result<T>
	where
		T: DeserializeOwned,
	{
		obs::observe(OperationKind::Get, "get_by_id", async move {
			let path = format!("{}/", record_path(object_type, id)?);

			self.get_record(with_fields(FetchRequest::get(path), fields)).await
		})
		.await
	}

	/// Reads a record through an external id field.
	pub async fn get_by_external_id(
		&self,
		object_type: &str,
		field: &str,
		value: &str,
		fields: &[&str],
	) -> Result<Record> {
		obs::observe(OperationKind::Get, "get_by_external_id", async move {
			let object_type = client::path_segment("object type", object_type)?;
			let field = client::path_segment("external id field", field)?;
			let value = client::path_segment("external id value", value)?;
			let request = FetchRequest::get(format!("/sobjects/{object_type}/{field}/{value}"));

			self.get_record(with_fields(request, fields)).await
		})
		.await
	}

	async fn get_record<T>(&self, request: FetchRequest) -> Result<T>
	where
		T: DeserializeOwned,
	{
		self.send(request).await?.into_result()?.json()
	}
}

fn record_path(object_type: &str, id: &str) -> Result<String> {
	let object_type = client::path_segment("object type", object_type)?;
	let id = client::path_segment("record id", id)?;

	Ok(format!("/sobjects/{object_type}/{id}"))
}

fn with_fields(request: FetchRequest, fields: &[&str]) -> FetchRequest {
	if fields.is_empty() { request } else { request.query_pair("fields", fields.join(",")) }
}
