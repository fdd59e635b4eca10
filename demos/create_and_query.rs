//! Creates an `Account` against a live org configured through `.env`, then reads it back with
//! SOQL and prints every field alongside its JSON type.
//!
//! Required keys: `ORG_URL`, `CLIENT_ID`, `CLIENT_SECRET`, `USERNAME`, `PASSWORD`; `API_VERSION`
//! is optional.

// crates.io
use color_eyre::Result;
use serde_json::{Value, json};
// self
use salesforce_rest::{ClientConfig, SalesforceClient};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let client = SalesforceClient::new(ClientConfig::from_dotenv()?);
	let id = client.create("Account", &json!({ "Name": "New Account" })).await?;

	println!("Account created: {id}");

	let soql = format!("SELECT Id, Name, Parent.Name, CreatedDate FROM Account WHERE Id = '{id}'");
	let records = client.query(&soql).await?;

	for (index, record) in records.iter().enumerate() {
		println!("Index {index}");

		for (key, value) in record {
			println!("{key}: {value}");
			println!("Type: {}", json_type(value));
		}
	}

	Ok(())
}

fn json_type(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "bool",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}
