//! Optional observability helpers for client operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` (on by default) to emit spans named `salesforce_rest.operation` with the
//!   `operation` and `stage` fields plus a `status` field recorded once the response arrives.
//! - Enable `metrics` to increment the `salesforce_rest_operation_total` counter for every
//!   attempt/success/failure, labeled by `operation` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
	/// Password grant against the token endpoint.
	Token,
	/// Raw authenticated fetch.
	Fetch,
	/// sObject create.
	Create,
	/// sObject update.
	Update,
	/// sObject delete.
	Delete,
	/// sObject read by id or external id.
	Get,
	/// SOQL query.
	Query,
	/// Composite batch.
	Composite,
	/// sObject collections batch.
	Collections,
}
impl OperationKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationKind::Token => "token",
			OperationKind::Fetch => "fetch",
			OperationKind::Create => "create",
			OperationKind::Update => "update",
			OperationKind::Delete => "delete",
			OperationKind::Get => "get",
			OperationKind::Query => "query",
			OperationKind::Composite => "composite",
			OperationKind::Collections => "collections",
		}
	}
}
impl Display for OperationKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationOutcome {
	/// Entry to a client operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OperationOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationOutcome::Attempt => "attempt",
			OperationOutcome::Success => "success",
			OperationOutcome::Failure => "failure",
		}
	}
}
impl Display for OperationOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside an operation span and records attempt + outcome metrics.
pub(crate) async fn observe<T, Fut>(kind: OperationKind, stage: &'static str, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	let span = OperationSpan::new(kind, stage);

	record_operation_outcome(kind, OperationOutcome::Attempt);

	let result = span.instrument(fut).await;

	match &result {
		Ok(_) => record_operation_outcome(kind, OperationOutcome::Success),
		Err(_) => record_operation_outcome(kind, OperationOutcome::Failure),
	}

	result
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn observe_passes_results_through() {
		let ok = observe(OperationKind::Query, "test", async { Ok(7) }).await;

		assert_eq!(ok.expect("Successful futures should pass through."), 7);

		let err = observe::<(), _>(OperationKind::Delete, "test", async {
			Err(crate::error::ConfigError::MissingField { field: "id" }.into())
		})
		.await;

		assert!(err.is_err());
	}

	#[test]
	fn labels_are_stable() {
		assert_eq!(OperationKind::Collections.to_string(), "collections");
		assert_eq!(OperationOutcome::Failure.to_string(), "failure");
	}
}
