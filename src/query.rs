//! SOQL queries. Only the first page of results is ever returned.

// self
use crate::{
	_prelude::*,
	client::SalesforceClient,
	error::ConfigError,
	http::FetchRequest,
	obs::{self, OperationKind},
};

/// One page of SOQL results.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse<T> {
	/// `false` when more pages exist on the server.
	pub done: bool,
	/// Number of rows matching the query across all pages.
	pub total_size: u64,
	/// Locator for the next page; never followed by this client.
	#[serde(default)]
	pub next_records_url: Option<String>,
	/// Rows on this page.
	#[serde(default = "Vec::new")]
	pub records: Vec<T>,
}

impl SalesforceClient {
	/// Runs a SOQL query and returns the records of the first page.
	pub async fn query(&self, soql: &str) -> Result<Vec<Record>> {
		self.query_as(soql).await
	}

	/// Runs a SOQL query and decodes the first page of records into `T`.
	pub async fn query_as<T>(&self, soql: &str) -> Result<Vec<T>>
	where
		T: DeserializeOwned,
	{
		Ok(self.query_page(soql).await?.records)
	}

	/// Runs a SOQL query and returns the first page with its paging metadata.
	pub async fn query_page<T>(&self, soql: &str) -> Result<QueryResponse<T>>
	where
		T: DeserializeOwned,
	{
		obs::observe(OperationKind::Query, "query", async move {
			if soql.trim().is_empty() {
				return Err(ConfigError::MissingField { field: "soql" }.into());
			}

			let request = FetchRequest::get("/query").query_pair("q", soql);
			let page = self.send(request).await?.into_result()?.json::<QueryResponse<T>>()?;

			if !page.done {
				obs::record_partial_query(page.total_size, page.records.len());
			}

			Ok(page)
		})
		.await
	}
}
