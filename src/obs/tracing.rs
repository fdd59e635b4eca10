// self
use crate::{_prelude::*, obs::OperationKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOperation<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOperation<F> = F;

/// A span builder used by client operations.
#[derive(Clone, Debug)]
pub struct OperationSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OperationSpan {
	/// Creates a new span tagged with the provided operation kind + stage.
	pub fn new(kind: OperationKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"salesforce_rest.operation",
				operation = kind.as_str(),
				stage,
				status = tracing::field::Empty,
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOperation<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Records the HTTP status on the current operation span and emits a debug event.
pub fn record_status(method: &Method, path: &str, status: u16) {
	#[cfg(feature = "tracing")]
	{
		tracing::Span::current().record("status", status);
		tracing::debug!(%method, path, status, "salesforce response received");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (method, path, status);
	}
}

/// Notes that a SOQL query returned only its first page.
pub fn record_partial_query(total_size: u64, returned: usize) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(
			total_size,
			returned,
			"query returned a partial page; remaining pages are not fetched"
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (total_size, returned);
	}
}

/// Notes that the cached token was dropped.
pub fn record_token_invalidated(reason: &'static str) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(reason, "cached access token invalidated");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = reason;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn helpers_run_outside_spans() {
		record_status(&Method::GET, "/query", 200);
		record_partial_query(4000, 2000);
		record_token_invalidated("test");
	}

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = OperationSpan::new(OperationKind::Query, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
